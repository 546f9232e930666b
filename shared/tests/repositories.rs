mod common;

use common::{client, signed_in, user_json, FakeTransport, Reply};
use serde_json::json;
use shared::models::{
    Attachment, ConversationId, CreateActivityRequest, CreateGroupRequest, GroupId, LatLon,
    PlanId, UpdateGroupRequest, UpdateProfileRequest, UserId,
};
use shared::repositories::RegisterRequest;
use shared::transport::HttpMethod;
use shared::{ErrorKind, SessionStatus};
use zeroize::Zeroizing;

#[tokio::test]
async fn group_detail_is_cached_until_updated() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/g1/",
        Reply::Json(200, json!({"id": "g1", "name": "Before"})),
    );
    transport.on(
        HttpMethod::Get,
        "groups/g1/",
        Reply::Json(200, json!({"id": "g1", "name": "After"})),
    );
    transport.on(
        HttpMethod::Patch,
        "groups/g1/",
        Reply::Json(200, json!({"group": {"id": "g1", "name": "After"}})),
    );
    let client = signed_in(&transport, "a", "r");
    let groups = client.groups();
    let id = GroupId::new("g1");

    let first = groups.get_group_detail(&id, false).await.unwrap();
    let second = groups.get_group_detail(&id, false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(transport.count(HttpMethod::Get, "groups/g1/"), 1);

    let updated = groups
        .update_group(
            &id,
            &UpdateGroupRequest {
                name: Some("After".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "After");
    assert_eq!(
        transport.last(HttpMethod::Patch, "groups/g1/").unwrap().json,
        Some(json!({"name": "After"}))
    );

    let third = groups.get_group_detail(&id, false).await.unwrap();
    assert_eq!(third.name, "After");
    assert_eq!(transport.count(HttpMethod::Get, "groups/g1/"), 2);
}

#[tokio::test]
async fn force_refresh_bypasses_cache() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/g1/",
        Reply::Json(200, json!({"id": "g1", "name": "Trip"})),
    );
    let client = signed_in(&transport, "a", "r");
    let id = GroupId::new("g1");

    client.groups().get_group_detail(&id, false).await.unwrap();
    client.groups().get_group_detail(&id, true).await.unwrap();

    assert_eq!(transport.count(HttpMethod::Get, "groups/g1/"), 2);
}

#[tokio::test]
async fn membership_changes_evict_group_detail() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/g1/",
        Reply::Json(200, json!({"id": "g1", "name": "Trip"})),
    );
    transport.on(HttpMethod::Post, "groups/g1/join/", Reply::Empty(204));
    transport.on(HttpMethod::Post, "groups/g1/leave/", Reply::Empty(204));
    let client = signed_in(&transport, "a", "r");
    let groups = client.groups();
    let id = GroupId::new("g1");

    groups.get_group_detail(&id, false).await.unwrap();
    groups.join_group(&id).await.unwrap();
    assert!(!groups.cache().contains(&id));

    groups.get_group_detail(&id, false).await.unwrap();
    groups.leave_group(&id).await.unwrap();
    groups.get_group_detail(&id, false).await.unwrap();

    assert_eq!(transport.count(HttpMethod::Get, "groups/g1/"), 3);
}

#[tokio::test]
async fn list_skips_malformed_items() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/g1/plans/",
        Reply::Json(
            200,
            json!({"results": [{"id": "1", "title": "A"}, {"bad": true}]}),
        ),
    );
    let client = signed_in(&transport, "a", "r");

    let plans = client
        .plans()
        .list_plans(&GroupId::new("g1"))
        .await
        .unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].title, "A");
}

#[tokio::test]
async fn list_accepts_bare_array_and_named_key() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/",
        Reply::Json(200, json!([{"id": 1, "name": "One"}])),
    );
    transport.on(
        HttpMethod::Get,
        "friends/",
        Reply::Json(200, json!({"friends": [user_json("2"), user_json("3")]})),
    );
    let client = signed_in(&transport, "a", "r");

    assert_eq!(client.groups().list_groups().await.unwrap().len(), 1);
    assert_eq!(client.friends().list_friends().await.unwrap().len(), 2);
}

#[tokio::test]
async fn activity_writes_evict_parent_plan() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "plans/p1/",
        Reply::Json(200, json!({"id": "p1", "title": "Ha Giang loop"})),
    );
    transport.on(
        HttpMethod::Post,
        "plans/p1/activities/",
        Reply::Json(201, json!({"id": "a1", "title": "Ma Pi Leng pass"})),
    );
    let client = signed_in(&transport, "a", "r");
    let plans = client.plans();
    let id = PlanId::new("p1");

    plans.get_plan_detail(&id, false).await.unwrap();
    let activity = plans
        .add_activity(
            &id,
            &CreateActivityRequest {
                title: "Ma Pi Leng pass".into(),
                description: None,
                start_time: None,
                end_time: None,
                location: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(activity.id.as_str(), "a1");

    plans.get_plan_detail(&id, false).await.unwrap();
    assert_eq!(transport.count(HttpMethod::Get, "plans/p1/"), 2);
}

#[tokio::test]
async fn create_group_posts_body_and_decodes_wrapped_response() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "groups/",
        Reply::Json(201, json!({"data": {"id": 77, "name": "Phu Quoc"}})),
    );
    let client = signed_in(&transport, "a", "r");

    let group = client
        .groups()
        .create_group(&CreateGroupRequest {
            name: "Phu Quoc".into(),
            description: None,
            is_public: Some(true),
        })
        .await
        .unwrap();

    assert_eq!(group.id.as_str(), "77");
    assert_eq!(
        transport.last(HttpMethod::Post, "groups/").unwrap().json,
        Some(json!({"name": "Phu Quoc", "is_public": true}))
    );
}

#[tokio::test]
async fn validation_errors_surface_server_message() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "groups/",
        Reply::Json(400, json!({"name": ["This field may not be blank."]})),
    );
    let client = signed_in(&transport, "a", "r");

    let err = client
        .groups()
        .create_group(&CreateGroupRequest {
            name: String::new(),
            description: None,
            is_public: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.message(), "name: This field may not be blank.");
}

#[tokio::test]
async fn login_stores_credential_and_notifies() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "auth/login/",
        Reply::Json(
            200,
            json!({"access": "a1", "refresh": "r1", "user": user_json("9")}),
        ),
    );
    let client = client(&transport);
    let status = client.subscribe();

    let user = client
        .auth()
        .login("user9", Zeroizing::new("correct horse".to_string()))
        .await
        .unwrap();

    assert_eq!(user.id, UserId::new("9"));
    let credential = client.session().credential().unwrap();
    assert_eq!(credential.access.expose(), "a1");
    assert_eq!(credential.refresh.expose(), "r1");
    assert_eq!(credential.user, user);
    assert_eq!(
        *status.borrow(),
        SessionStatus::SignedIn {
            user_id: UserId::new("9")
        }
    );

    let sent = transport.last(HttpMethod::Post, "auth/login/").unwrap();
    assert!(sent.authorization.is_none());
    assert_eq!(
        sent.json,
        Some(json!({"username": "user9", "password": "correct horse"}))
    );
}

#[tokio::test]
async fn login_failure_leaves_session_signed_out() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "auth/login/",
        Reply::Json(
            400,
            json!({"non_field_errors": ["Unable to log in with provided credentials."]}),
        ),
    );
    let client = client(&transport);

    let err = client
        .auth()
        .login("user9", Zeroizing::new("wrong".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Unable to log in with provided credentials.");
    assert!(!client.session().is_authenticated());

    let err = client
        .auth()
        .login("  ", Zeroizing::new("x".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test]
async fn register_fetches_profile_when_response_has_no_user() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Post,
        "auth/register/",
        Reply::Json(201, json!({"tokens": {"access": "a1", "refresh": "r1"}})),
    );
    transport.on(
        HttpMethod::Get,
        "auth/me/",
        Reply::RequireBearer {
            token: "a1".into(),
            status: 200,
            body: user_json("5"),
        },
    );
    let client = client(&transport);

    let user = client
        .auth()
        .register(RegisterRequest {
            username: "user5".into(),
            email: "user5@example.com".into(),
            password: Zeroizing::new("s3cret-pass".into()),
            display_name: Some("Five".into()),
        })
        .await
        .unwrap();

    assert_eq!(user.id.as_str(), "5");
    assert_eq!(client.session().current_user(), Some(user));
}

#[tokio::test]
async fn logout_clears_session_and_every_cache_even_if_server_fails() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "groups/g1/",
        Reply::Json(200, json!({"id": "g1", "name": "Trip"})),
    );
    transport.on(
        HttpMethod::Get,
        "users/2/",
        Reply::Json(200, user_json("2")),
    );
    transport.on(
        HttpMethod::Post,
        "auth/logout/",
        Reply::Json(500, json!({"detail": "boom"})),
    );
    let client = signed_in(&transport, "a", "r");

    client
        .groups()
        .get_group_detail(&GroupId::new("g1"), false)
        .await
        .unwrap();
    client
        .users()
        .get_user(&UserId::new("2"), false)
        .await
        .unwrap();
    assert_eq!(client.groups().cache().len(), 1);

    client.logout().await;

    assert!(!client.session().is_authenticated());
    assert_eq!(client.session().status(), SessionStatus::SignedOut);
    assert!(client.groups().cache().is_empty());
    assert!(client.users().cache().is_empty());
    assert_eq!(
        transport.last(HttpMethod::Post, "auth/logout/").unwrap().json,
        Some(json!({"refresh": "r"}))
    );
}

#[tokio::test]
async fn profile_update_refreshes_session_user() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "users/1/",
        Reply::Json(200, user_json("1")),
    );
    transport.on(
        HttpMethod::Patch,
        "auth/me/",
        Reply::Json(
            200,
            json!({"id": "1", "username": "user1", "full_name": "Lan"}),
        ),
    );
    transport.on(
        HttpMethod::Patch,
        "auth/me/avatar/",
        Reply::Json(
            200,
            json!({"user": {"id": "1", "username": "user1", "avatar": "https://cdn.test/1.jpg"}}),
        ),
    );
    let client = signed_in(&transport, "a", "r");
    let me = UserId::new("1");

    client.users().get_user(&me, false).await.unwrap();
    let updated = client
        .users()
        .update_profile(&UpdateProfileRequest {
            display_name: Some("Lan".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.label(), "Lan");
    assert_eq!(client.session().current_user(), Some(updated));
    assert!(!client.users().cache().contains(&me));

    let avatar = Attachment::new("me.png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap();
    let updated = client.users().upload_avatar(avatar).await.unwrap();
    assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn.test/1.jpg"));

    let sent = transport.last(HttpMethod::Patch, "auth/me/avatar/").unwrap();
    assert_eq!(sent.multipart_files, vec!["avatar=me.png".to_string()]);
    assert_eq!(sent.authorization.as_deref(), Some("Bearer a"));
}

#[tokio::test]
async fn messages_are_paged_and_attachments_are_multipart() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "conversations/c1/messages/",
        Reply::Json(
            200,
            json!({
                "count": 3,
                "next": "https://api.test/api/conversations/c1/messages/?page=2",
                "previous": null,
                "results": [
                    {"id": 1, "sender": 2, "text": "Chào"},
                    {"id": 2, "sender": 1, "text": "Hi"}
                ]
            }),
        ),
    );
    transport.on(
        HttpMethod::Post,
        "conversations/c1/messages/",
        Reply::Json(
            201,
            json!({"id": 3, "sender": 1, "text": "ticket", "attachment": "https://cdn.test/t.pdf"}),
        ),
    );
    let client = signed_in(&transport, "a", "r");
    let conversation = ConversationId::new("c1");

    let page = client
        .conversations()
        .list_messages(&conversation, 0)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.count, Some(3));
    assert!(page.has_more());
    assert_eq!(
        transport
            .last(HttpMethod::Get, "conversations/c1/messages/")
            .unwrap()
            .query
            .as_deref(),
        Some("page=1")
    );

    let file = Attachment::new("ticket.pdf", b"%PDF-1.7".to_vec()).unwrap();
    let message = client
        .conversations()
        .send_attachment(&conversation, file, Some("Train ticket"))
        .await
        .unwrap();
    assert_eq!(message.attachment_url.as_deref(), Some("https://cdn.test/t.pdf"));

    let sent = transport
        .last(HttpMethod::Post, "conversations/c1/messages/")
        .unwrap();
    assert_eq!(
        sent.multipart_fields,
        vec![("text".to_string(), "Train ticket".to_string())]
    );
    assert_eq!(sent.multipart_files, vec!["attachment=ticket.pdf".to_string()]);
}

#[tokio::test]
async fn client_side_validation_never_hits_network() {
    let transport = FakeTransport::new();
    let client = signed_in(&transport, "a", "r");

    let center = LatLon::new(16.0544, 108.2022).unwrap();
    let err = client.locations().nearby(center, 100).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = client
        .conversations()
        .send_message(&ConversationId::new("c1"), "   ")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    assert!(client.users().search_users(" ").await.unwrap().is_empty());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn nearby_sends_coordinates() {
    let transport = FakeTransport::new();
    transport.on(
        HttpMethod::Get,
        "locations/nearby/",
        Reply::Json(200, json!({"data": {"locations": [{"id": 1, "name": "My Khe"}]}})),
    );
    let client = signed_in(&transport, "a", "r");

    let center = LatLon::new(16.0544, 108.2022).unwrap();
    let found = client.locations().nearby(center, 5_000).await.unwrap();

    assert_eq!(found.len(), 1);
    let query = transport
        .last(HttpMethod::Get, "locations/nearby/")
        .unwrap()
        .query
        .unwrap();
    assert_eq!(query, "lat=16.054400&lng=108.202200&radius=5000");
}

#[tokio::test]
async fn unknown_route_maps_to_not_found() {
    let transport = FakeTransport::new();
    let client = signed_in(&transport, "a", "r");

    let err = client
        .locations()
        .get_location(&shared::models::LocationId::new("404"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), "Not found.");
    assert_eq!(err.user_facing_message(), "Not found.");
}

#[tokio::test]
async fn profile_saved_after_sign_out_is_still_returned() {
    let transport = FakeTransport::new();
    transport.set_latency(std::time::Duration::from_millis(50));
    transport.on(
        HttpMethod::Patch,
        "auth/me/",
        Reply::Json(
            200,
            json!({"id": "1", "username": "user1", "full_name": "Lan"}),
        ),
    );
    let client = signed_in(&transport, "a", "r");
    let request = UpdateProfileRequest {
        display_name: Some("Lan".into()),
        ..Default::default()
    };

    let (updated, ()) = tokio::join!(client.users().update_profile(&request), async {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        client.session().clear();
    });

    assert_eq!(updated.unwrap().label(), "Lan");
    assert!(client.session().current_user().is_none());
}
