mod support;

use axum::http::StatusCode;

use support::{TestApp, body_text, card_count, cookies};

async fn seeded(count: i64) -> TestApp {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    for n in 1..=count {
        app.store.add_post(&format!("Story {n:02}"), world).await;
    }
    app
}

#[tokio::test]
async fn second_page_of_forty_five_posts_lists_items_twenty_one_to_forty() {
    let app = seeded(45).await;

    let response = app.get("/Home/Index?page=2", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert_eq!(card_count(&html), 20);
    assert!(html.contains(">Story 25<"), "newest on page 2 should be Story 25");
    assert!(html.contains(">Story 06<"), "oldest on page 2 should be Story 06");
    assert!(!html.contains(">Story 26<"));
    assert!(!html.contains(">Story 05<"));
    assert!(html.contains("Page 2 of 3"));
    assert!(html.contains("href=\"/Home/Index?page=1\""));
    assert!(html.contains("href=\"/Home/Index?page=3\""));
}

#[tokio::test]
async fn non_positive_and_garbage_pages_fall_back_to_first_page() {
    let app = seeded(45).await;

    for uri in ["/?page=0", "/?page=-4", "/?page=two", "/"] {
        let html = body_text(app.get(uri, None).await).await;
        assert_eq!(card_count(&html), 20, "{uri}");
        assert!(html.contains(">Story 45<"), "{uri}");
        assert!(html.contains("Page 1 of 3"), "{uri}");
    }
}

#[tokio::test]
async fn page_past_the_end_is_empty_but_keeps_metadata() {
    let app = seeded(45).await;

    let response = app.get("/Home/Index?page=9", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert_eq!(card_count(&html), 0);
    assert!(html.contains("No stories found."));
    assert!(html.contains("Page 9 of 3"));
}

#[tokio::test]
async fn category_listing_only_shows_matching_posts() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    let sport = app.store.add_category("Sport").await;
    app.store.add_post("Summit ends", world).await;
    app.store.add_post("Cup final", sport).await;

    let html = body_text(app.get(&format!("/Home/PostsByCategory/{sport}"), None).await).await;

    assert_eq!(card_count(&html), 1);
    assert!(html.contains(">Cup final<"));
    assert!(!html.contains(">Summit ends<"));
}

#[tokio::test]
async fn category_listing_stays_on_first_page_whatever_the_query() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    for n in 1..=45 {
        app.store.add_post(&format!("Story {n:02}"), world).await;
    }
    let admin = app.admin_cookies().await;

    for (uri, cookie) in [
        (format!("/Home/PostsByCategory/{world}?page=2"), None),
        (format!("/Post/PostsByCategory/{world}?page=3"), Some(admin.as_str())),
    ] {
        let response = app.get(&uri, cookie).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let html = body_text(response).await;

        assert_eq!(card_count(&html), 20, "{uri}");
        assert!(html.contains(">Story 45<"), "{uri} should show the newest story");
        assert!(!html.contains(">Story 25<"), "{uri} should not reach page 2");
        assert!(html.contains("Page 1 of 3"), "{uri}");
        assert!(!html.contains("?page="), "{uri} should not link to other pages");
    }
}

#[tokio::test]
async fn unknown_category_renders_an_empty_listing() {
    let app = seeded(3).await;

    let response = app.get("/Home/PostsByCategory/999", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(card_count(&html), 0);
    assert!(html.contains("No stories found."));
}

#[tokio::test]
async fn search_matches_case_insensitively_and_blank_matches_everything() {
    let app = TestApp::new();
    let world = app.store.add_category("World").await;
    app.store.add_post("Harbour reopens", world).await;
    app.store.add_post("Election night", world).await;
    let cookie = cookies(None);

    let html = body_text(
        app.post_form(
            "/Post/Search",
            Some(&cookie),
            &[("__csrf", support::CSRF_TOKEN), ("searchString", "HARBOUR")],
        )
        .await,
    )
    .await;
    assert_eq!(card_count(&html), 1);
    assert!(html.contains(">Harbour reopens<"));
    assert!(html.contains("value=\"HARBOUR\""));

    let html = body_text(
        app.post_form(
            "/Post/Search",
            Some(&cookie),
            &[("__csrf", support::CSRF_TOKEN), ("searchString", "   ")],
        )
        .await,
    )
    .await;
    assert_eq!(card_count(&html), 2);
}

#[tokio::test]
async fn admin_listing_shows_edit_links_and_public_listing_does_not() {
    let app = seeded(2).await;

    let public = body_text(app.get("/Home/Index", None).await).await;
    assert!(!public.contains("/Post/Edit/"));

    let admin = app.admin_cookies().await;
    let response = app.get("/Post/Index", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("href=\"/Post/Edit/2\""));
    assert!(html.contains("href=\"/Post/Delete/2\""));
}
