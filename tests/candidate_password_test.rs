// Password signup and login through the HTTP surface
use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use pocketsend::handlers::{configure_services, json_config};
use pocketsend::testing::constants::{TEST_EMAIL, TEST_PASSWORD, TEST_PHONE};
use pocketsend::testing::TestFixtures;

macro_rules! app {
    ($fixture:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($fixture.services.clone()))
                .app_data(web::Data::new($fixture.settings.clone()))
                .app_data(json_config())
                .configure(configure_services),
        )
        .await
    };
}

fn signup_body() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": TEST_EMAIL,
        "mobileNumber": TEST_PHONE,
        "password": TEST_PASSWORD,
    })
}

#[actix_web::test]
async fn test_signup_then_login_by_email_and_phone() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    let app = app!(fixture);

    let req = test::TestRequest::post()
        .uri("/auth/candidate-signup")
        .set_json(signup_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Candidate account created successfully");
    assert_eq!(body["data"]["email"], TEST_EMAIL);
    assert!(body["data"]["candidate_id"].is_string());

    // Email lookups are case-insensitive
    let req = test::TestRequest::post()
        .uri("/auth/candidate-login")
        .set_json(json!({ "email": "ADA@Example.com", "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["candidate"]["firstName"], "Ada");
    assert_eq!(body["candidate"]["email"], TEST_EMAIL);

    let req = test::TestRequest::post()
        .uri("/auth/candidate-login")
        .set_json(json!({ "phone": TEST_PHONE, "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_signup_rejections() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    let app = app!(fixture);

    let mut missing = signup_body();
    missing["lastName"] = json!("");
    let req = test::TestRequest::post()
        .uri("/auth/candidate-signup")
        .set_json(missing)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "All fields are required");

    let mut short = signup_body();
    short["password"] = json!("short");
    let req = test::TestRequest::post()
        .uri("/auth/candidate-signup")
        .set_json(short)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Password must be at least 8 characters");

    let mut bad_email = signup_body();
    bad_email["email"] = json!("not-an-email");
    let req = test::TestRequest::post()
        .uri("/auth/candidate-signup")
        .set_json(bad_email)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    fixture.seed_password_candidate().await;
    let req = test::TestRequest::post()
        .uri("/auth/candidate-signup")
        .set_json(signup_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "A candidate with this email or mobile number already exists"
    );
}

#[actix_web::test]
async fn test_login_failures_are_indistinguishable() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    fixture.seed_password_candidate().await;
    let app = app!(fixture);

    let wrong_password = json!({ "email": TEST_EMAIL, "password": "wrong password" });
    let unknown_email = json!({ "email": "nobody@example.com", "password": TEST_PASSWORD });

    let mut bodies = Vec::new();
    for payload in [wrong_password, unknown_email] {
        let req = test::TestRequest::post()
            .uri("/auth/candidate-login")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        bodies.push(body);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["error"], "Invalid email or password");
}

#[actix_web::test]
async fn test_magic_link_only_candidate_cannot_password_login() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    fixture.seed_candidate(TEST_PHONE).await;
    let app = app!(fixture);

    let req = test::TestRequest::post()
        .uri("/auth/candidate-login")
        .set_json(json!({ "phone": TEST_PHONE, "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_disabled_account_gets_403_only_with_correct_password() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    let candidate = fixture.seed_password_candidate().await;
    fixture
        .services
        .directory
        .set_active(candidate.id, false)
        .await
        .unwrap();
    let app = app!(fixture);

    let req = test::TestRequest::post()
        .uri("/auth/candidate-login")
        .set_json(json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Account is disabled. Please contact support.");

    let req = test::TestRequest::post()
        .uri("/auth/candidate-login")
        .set_json(json!({ "email": TEST_EMAIL, "password": "wrong password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_login_requires_identifier_and_password() {
    let fixture = TestFixtures::services(TestFixtures::settings());
    let app = app!(fixture);

    for payload in [
        json!({ "password": TEST_PASSWORD }),
        json!({ "email": TEST_EMAIL }),
        json!({ "email": "", "password": "" }),
    ] {
        let req = test::TestRequest::post()
            .uri("/auth/candidate-login")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Email and password are required");
    }
}
