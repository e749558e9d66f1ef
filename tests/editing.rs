mod support;

use axum::http::StatusCode;

use support::{CSRF_TOKEN, TestApp, body_text, location, multipart_body};

#[tokio::test]
async fn valid_create_stores_one_post_and_redirects_to_index() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let admin = app.admin_cookies().await;
    let category = world.to_string();

    let body = multipart_body(
        &[
            ("__csrf", CSRF_TOKEN),
            ("title", "Bridge opens"),
            ("description", "The new crossing is open to traffic."),
            ("body", "First paragraph.\r\n\r\nSecond paragraph."),
            ("category_id", &category),
        ],
        Some(("bridge.jpg", b"jpeg-bytes")),
    );
    let response = app.post_multipart("/Post/Create", Some(&admin), body).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/Post/Index"));
    assert_eq!(app.store.create_calls().await, 1);

    let post = app.store.post(1).await.expect("post stored");
    assert_eq!(post.title, "Bridge opens");
    assert_eq!(post.category_id, world);
    let image_path = post.image_path.expect("attachment recorded");
    assert!(image_path.starts_with("attachments/"));
    assert!(image_path.ends_with(".jpg"));
    let stored = std::fs::read(app.uploads.path().join(&image_path)).expect("attachment on disk");
    assert_eq!(stored, b"jpeg-bytes");
}

#[tokio::test]
async fn invalid_create_rerenders_form_with_values_and_never_creates() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let admin = app.admin_cookies().await;
    let category = world.to_string();

    let body = multipart_body(
        &[
            ("__csrf", CSRF_TOKEN),
            ("title", ""),
            ("description", "Kept description"),
            ("body", ""),
            ("category_id", &category),
        ],
        None,
    );
    let response = app.post_multipart("/Post/Create", Some(&admin), body).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("Title is required."));
    assert!(html.contains("Text is required."));
    assert!(html.contains("Kept description"));
    assert!(html.contains(&format!("<option value=\"{world}\" selected>")));
    assert_eq!(app.store.create_calls().await, 0);
    assert_eq!(app.store.post_count().await, 0);
}

#[tokio::test]
async fn unknown_category_is_a_validation_failure() {
    let app = TestApp::new();
    app.store.add_category("World").await;
    let admin = app.admin_cookies().await;

    let body = multipart_body(
        &[
            ("__csrf", CSRF_TOKEN),
            ("title", "Orphan"),
            ("description", "No home"),
            ("body", "Text"),
            ("category_id", "42"),
        ],
        None,
    );
    let response = app.post_multipart("/Post/Create", Some(&admin), body).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Choose an existing category."));
    assert_eq!(app.store.create_calls().await, 0);
}

#[tokio::test]
async fn edit_round_trip_updates_the_post_and_keeps_its_image() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let sport = app.store.add_category("Sport").await;
    let id = app.store.add_post("Original", world).await;
    let admin = app.admin_cookies().await;

    let form = app.get(&format!("/Post/Edit/{id}"), Some(&admin)).await;
    assert_eq!(form.status(), StatusCode::OK);
    let html = body_text(form).await;
    assert!(html.contains("value=\"Original\""));

    let category = sport.to_string();
    let body = multipart_body(
        &[
            ("__csrf", CSRF_TOKEN),
            ("title", "Revised"),
            ("description", "Revised lead"),
            ("body", "Revised body"),
            ("category_id", &category),
        ],
        None,
    );
    let response = app
        .post_multipart(&format!("/Post/Edit/{id}"), Some(&admin), body)
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/Post/Index"));
    let post = app.store.post(id).await.expect("post kept");
    assert_eq!(post.title, "Revised");
    assert_eq!(post.category_id, sport);
    assert_eq!(post.category_name, "Sport");

    let detail = body_text(app.get(&format!("/Post/FullNews/{id}"), None).await).await;
    assert!(detail.contains("Revised body"));
}

#[tokio::test]
async fn edit_of_missing_post_is_not_found_without_update() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let admin = app.admin_cookies().await;

    let response = app.get("/Post/Edit/77", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let category = world.to_string();
    let body = multipart_body(
        &[
            ("__csrf", CSRF_TOKEN),
            ("title", "Ghost"),
            ("description", "Ghost"),
            ("body", "Ghost"),
            ("category_id", &category),
        ],
        None,
    );
    let response = app.post_multipart("/Post/Edit/77", Some(&admin), body).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.update_calls().await, 0);
}

#[tokio::test]
async fn delete_confirmation_never_deletes() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let id = app.store.add_post("Keep me", world).await;
    let admin = app.admin_cookies().await;

    let response = app.get(&format!("/Post/Delete/{id}"), Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(&format!("action=\"/Post/DeleteById/{id}\"")));

    assert_eq!(app.store.delete_calls().await, 0);
    assert!(app.store.post(id).await.is_some());

    let missing = app.get("/Post/Delete/404", Some(&admin)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_by_id_removes_the_post_and_redirects() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let id = app.store.add_post("Remove me", world).await;
    let admin = app.admin_cookies().await;

    let response = app
        .post_form(
            &format!("/Post/DeleteById/{id}"),
            Some(&admin),
            &[("__csrf", CSRF_TOKEN)],
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/Post/Index"));
    assert!(app.store.post(id).await.is_none());
}

#[tokio::test]
async fn delete_by_id_accepts_get_with_query_token() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let id = app.store.add_post("Remove me", world).await;
    let admin = app.admin_cookies().await;

    let response = app
        .get(
            &format!("/Post/DeleteById/{id}?__csrf={CSRF_TOKEN}"),
            Some(&admin),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.store.post(id).await.is_none());
}

#[tokio::test]
async fn delete_by_id_of_missing_post_is_not_found_without_delete() {
    let app = TestApp::new();
    let admin = app.admin_cookies().await;

    let response = app
        .post_form("/Post/DeleteById/31", Some(&admin), &[("__csrf", CSRF_TOKEN)])
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.delete_calls().await, 0);
}

#[tokio::test]
async fn full_news_renders_paragraphs_and_missing_is_not_found() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let id = app.store.add_post("Tidal record", world).await;

    let response = app.get(&format!("/Post/FullNews/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<h1>Tidal record</h1>"));
    assert!(html.contains("<p>Tidal record in full.</p>"));

    for uri in ["/Post/FullNews/999", "/Post/FullNews/abc"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert!(body_text(response).await.contains("Not found"));
    }
}
