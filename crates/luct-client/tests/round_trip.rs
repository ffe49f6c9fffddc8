use std::sync::Arc;

use reqwest::StatusCode;

use luct_api::{AppState, AppStateInner, TokenIssuer, create_router};
use luct_client::{ApiClient, ClientError};
use luct_db::Database;
use luct_types::api::{CreateReportRequest, RegisterRequest, UpdateUserRequest};
use luct_types::{ReportStatus, Role};

struct Server {
    _dir: tempfile::TempDir,
    state: AppState,
    client: ApiClient,
}

async fn spawn_server() -> Server {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("client-test.db")).unwrap();
    let state = Arc::new(AppStateInner {
        db,
        tokens: TokenIssuer::new("client-test-secret"),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        _dir: dir,
        state,
        client: ApiClient::new(format!("http://{addr}")),
    }
}

async fn register(client: &ApiClient, username: &str, role: Role) -> i64 {
    client
        .register(&RegisterRequest {
            username: username.into(),
            password: "pw".into(),
            role: role.to_string(),
            name: username.to_uppercase(),
            email: None,
        })
        .await
        .unwrap()
        .user_id
}

fn report(class_id: i64) -> CreateReportRequest {
    CreateReportRequest {
        class_id: Some(class_id),
        faculty_name: "FICT".into(),
        week_of_reporting: Some(2),
        date_of_lecture: "2024-02-06".into(),
        actual_students_present: Some(40),
        scheduled_lecture_time: "14:00".into(),
        topic_taught: "Recursion".into(),
        learning_outcomes: "Base cases".into(),
        lecturer_recommendations: Some("More practice".into()),
    }
}

#[tokio::test]
async fn whole_review_cycle_over_http() {
    let server = spawn_server().await;
    let client = &server.client;
    assert_eq!(client.health().await.unwrap().status, "OK");

    let lecturer_id = register(client, "lec", Role::Lecturer).await;
    register(client, "prl", Role::Prl).await;
    register(client, "pl", Role::Pl).await;
    let class_id = server.state.db.create_class(lecturer_id, "Y2", "Algorithms", "AL201").unwrap();

    let lecturer = client.login("lec", "pw").await.unwrap();
    assert_eq!(lecturer.user.role, Role::Lecturer);
    let prl = client.login("prl", "pw").await.unwrap().token;
    let pl = client.login("pl", "pw").await.unwrap().token;

    let classes = client.list_classes(&lecturer.token).await.unwrap();
    assert_eq!(classes.len(), 1);

    let submitted = client.submit_report(&lecturer.token, &report(class_id)).await.unwrap();
    assert_eq!(submitted.status, ReportStatus::Submitted);

    let reviewed = client.add_feedback(&prl, submitted.id, "Well paced").await.unwrap();
    assert_eq!(reviewed.status, ReportStatus::UnderReview);
    assert_eq!(client.prl_reports(&prl, Some("recursion")).await.unwrap().len(), 1);

    let approved = client.approve_report(&pl, submitted.id).await.unwrap();
    assert_eq!(approved.status, ReportStatus::Approved);

    let mine = client.lecturer_reports(&lecturer.token, None).await.unwrap();
    assert_eq!(mine[0].prl_feedback.as_deref(), Some("Well paced"));
    assert_eq!(mine[0].status, ReportStatus::Approved);

    let csv = client.export_reports(&pl).await.unwrap();
    assert!(csv.contains("AL201"));
}

#[tokio::test]
async fn server_errors_surface_as_api_errors() {
    let server = spawn_server().await;
    let client = &server.client;
    register(client, "stu", Role::Student).await;

    match client.login("stu", "nope").await {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("expected 401, got {other:?}"),
    }

    let token = client.login("stu", "pw").await.unwrap().token;
    let err = client.pl_reports(&token, None).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));

    let err = client.profile("not-a-token").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
}

#[tokio::test]
async fn password_change_takes_effect() {
    let server = spawn_server().await;
    let client = &server.client;
    let id = register(client, "stu", Role::Student).await;
    let token = client.login("stu", "pw").await.unwrap().token;

    let changes = UpdateUserRequest {
        password: Some("new-pw".into()),
        ..Default::default()
    };
    client.update_user(&token, id, &changes).await.unwrap();

    assert!(client.login("stu", "pw").await.is_err());
    let session = client.login("stu", "new-pw").await.unwrap();
    assert_eq!(client.profile(&session.token).await.unwrap().id, id);
}

#[tokio::test]
async fn admin_manages_accounts() {
    let server = spawn_server().await;
    let client = &server.client;
    let student_id = register(client, "stu", Role::Student).await;
    register(client, "root", Role::Admin).await;
    let admin = client.login("root", "pw").await.unwrap().token;

    let students = client.list_users(&admin, Role::Student).await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(client.get_user(&admin, student_id).await.unwrap().username, "stu");

    client.delete_user(&admin, student_id).await.unwrap();
    let err = client.get_user(&admin, student_id).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}
