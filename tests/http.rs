use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use extentrack_server::auth::token_hash;
use extentrack_server::config::{AdminBootstrap, Config};
use extentrack_server::coordinators::bootstrap_admin;
use extentrack_server::state::AppState;
use extentrack_server::store::MemoryStore;

const ADMIN_EMAIL: &str = "admin@extentrack.local";
const ADMIN_PASSWORD: &str = "admin-secret";

const MISSING_ID: &str = "00000000-0000-0000-0000-000000000000";

async fn read_json(response: Response<axum::body::BoxBody>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

struct Harness {
    app: Router,
    state: Arc<AppState>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    async fn with_config(config: Config) -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()), config);
        bootstrap_admin(
            &state,
            &AdminBootstrap {
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
                name: "Administrador".into(),
            },
        )
        .await
        .unwrap();
        Self {
            app: extentrack_server::app(state.clone()),
            state,
        }
    }

    async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<axum::body::BoxBody> {
        self.send(method, uri, token, body.map(|body| body.to_string()))
            .await
    }

    /// Like `raw`, but the body goes out exactly as given.
    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> Response<axum::body::BoxBody> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => request.body(Body::empty()),
        }
        .unwrap();
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        read_json(response).await
    }

    async fn login(&self, email: &str, password: &str, role: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password, "role": role })),
        )
        .await
    }

    async fn token(&self, email: &str, password: &str, role: &str) -> String {
        let (status, body) = self.login(email, password, role).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["session_id"].as_str().unwrap().to_string()
    }

    async fn admin(&self) -> String {
        self.token(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await
    }

    async fn create_coordinator(&self, admin: &str, email: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/functions/create-coordinator",
            Some(admin),
            Some(json!({
                "email": email,
                "password": "coord-pass",
                "name": "Maria Lima",
                "department": "Engenharia"
            })),
        )
        .await
    }

    /// A signed-in coordinator with one project and one student.
    async fn coordinator_with_roster(&self, email: &str, matricula: &str) -> Roster {
        let admin = self.admin().await;
        let (status, _) = self.create_coordinator(&admin, email).await;
        assert_eq!(status, StatusCode::OK);
        let token = self.token(email, "coord-pass", "coordinator").await;

        let (status, body) = self
            .call(
                Method::POST,
                "/projects",
                Some(&token),
                Some(json!({ "name": "Robótica nas Escolas" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let project_id = body["project"]["id"].as_str().unwrap().to_string();

        let student_id = self.student(&token, "Ana Souza", matricula).await;
        Roster {
            token,
            project_id,
            student_id,
        }
    }

    async fn student(&self, token: &str, name: &str, matricula: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/students",
                Some(token),
                Some(json!({ "name": name, "matricula": matricula, "course": "Direito" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["student"]["id"].as_str().unwrap().to_string()
    }

    async fn attend(&self, roster: &Roster, student_id: &str, hours: i64, dates: &[&str]) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/attendance",
                Some(&roster.token),
                Some(json!({
                    "project_id": roster.project_id,
                    "student_id": student_id,
                    "hours": hours,
                    "mode": "multiple",
                    "dates": dates,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

struct Roster {
    token: String,
    project_id: String,
    student_id: String,
}

#[tokio::test]
async fn wrong_dashboard_role_is_denied_and_ends_the_session() {
    let h = Harness::new().await;

    let (status, body) = h.login(ADMIN_EMAIL, ADMIN_PASSWORD, "coordinator").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
    assert_eq!(
        body["message"],
        "Esta conta não tem permissão para acessar como coordenador."
    );

    let token = h.admin().await;
    let (status, _) = h
        .call(Method::GET, "/auth/session?role=coordinator", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .call(Method::GET, "/auth/session?role=admin", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn bad_credentials_are_rejected() {
    let h = Harness::new().await;
    let (status, body) = h.login(ADMIN_EMAIL, "wrong", "admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Email ou senha incorretos.");

    let (status, body) = h.login("nobody@example.com", "wrong", "admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Email ou senha incorretos.");
}

#[tokio::test]
async fn only_admins_provision_coordinators() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;

    let (status, body) = h
        .create_coordinator(&roster.token, "intruder@example.com")
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = h.call(Method::POST, "/functions/create-coordinator", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin = h.admin().await;
    let (status, body) = h
        .call(Method::GET, "/coordinators", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let coordinators = body["coordinators"].as_array().unwrap();
    assert_eq!(coordinators.len(), 1);
    assert_eq!(coordinators[0]["email"], "coord@example.com");
}

#[tokio::test]
async fn provisioning_validates_and_rejects_duplicates() {
    let h = Harness::new().await;
    let admin = h.admin().await;

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/create-coordinator",
            Some(&admin),
            Some(json!({ "email": "c@example.com", "password": "p", "name": "C" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = h.create_coordinator(&admin, "c@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "coordinator");
    assert_eq!(body["message"], "Coordinator created successfully");

    let (status, body) = h.create_coordinator(&admin, "C@Example.com").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn deleted_coordinator_email_can_be_reused() {
    let h = Harness::new().await;
    let admin = h.admin().await;

    let (_, created) = h.create_coordinator(&admin, "c@example.com").await;
    let user_id = created["user"]["id"].as_str().unwrap().to_string();
    let coordinator = h.token("c@example.com", "coord-pass", "coordinator").await;

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/delete-coordinator",
            Some(&admin),
            Some(json!({ "userId": user_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = h
        .call(Method::GET, "/projects", Some(&coordinator), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .call(
            Method::POST,
            "/functions/delete-coordinator",
            Some(&admin),
            Some(json!({ "userId": user_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h.create_coordinator(&admin, "c@example.com").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_cannot_delete_itself() {
    let h = Harness::new().await;
    let (_, body) = h.login(ADMIN_EMAIL, ADMIN_PASSWORD, "admin").await;
    let token = body["session_id"].as_str().unwrap();
    let admin_id = body["user_id"].as_str().unwrap();

    let (status, _) = h
        .call(
            Method::POST,
            "/functions/delete-coordinator",
            Some(token),
            Some(json!({ "userId": admin_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn issued_credentials_live_only_as_long_as_the_session() {
    let h = Harness::new().await;
    let admin = h.admin().await;
    h.create_coordinator(&admin, "c@example.com").await;

    let (status, body) = h
        .call(Method::GET, "/credentials", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["credentials"],
        json!([{ "email": "c@example.com", "name": "Maria Lima", "password": "coord-pass" }])
    );

    let (status, body) = h.call(Method::POST, "/auth/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["drop_success"], true);

    let (status, _) = h
        .call(Method::GET, "/credentials", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = h.admin().await;
    let (_, body) = h
        .call(Method::GET, "/credentials", Some(&fresh), None)
        .await;
    assert_eq!(body["credentials"], json!([]));
}

#[tokio::test]
async fn attendance_accumulates_on_a_single_participation() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;

    let first = h
        .attend(
            &roster,
            &roster.student_id,
            4,
            &["2025-03-07", "2025-03-08", "2025-03-07"],
        )
        .await;
    assert_eq!(first["participation_created"], true);
    assert_eq!(first["days"], 2);
    assert_eq!(first["total_hours_registered"], 8);
    assert_eq!(first["participation"]["total_hours"], 8);

    let second = h
        .attend(&roster, &roster.student_id, 3, &["2025-03-10"])
        .await;
    assert_eq!(second["participation_created"], false);
    assert_eq!(second["participation"]["id"], first["participation"]["id"]);
    assert_eq!(second["participation"]["total_hours"], 11);

    let (status, body) = h
        .call(Method::GET, "/participations", Some(&roster.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["participations"].as_array().unwrap().len(), 1);
    assert_eq!(body["total_hours"], 11);

    let (_, body) = h
        .call(Method::GET, "/projects", Some(&roster.token), None)
        .await;
    assert_eq!(body["projects"][0]["student_count"], 1);
    assert_eq!(body["projects"][0]["total_hours"], 11);
}

#[tokio::test]
async fn attendance_rejects_empty_date_sets() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;

    let (status, body) = h
        .call(
            Method::POST,
            "/attendance",
            Some(&roster.token),
            Some(json!({
                "project_id": roster.project_id,
                "student_id": roster.student_id,
                "hours": 2,
                "mode": "multiple",
                "dates": [],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Selecione pelo menos uma data.");

    let (_, body) = h
        .call(Method::GET, "/participations", Some(&roster.token), None)
        .await;
    assert_eq!(body["participations"], json!([]));
}

#[tokio::test]
async fn public_lookup_is_scoped_to_one_registration() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    let other = h.student(&roster.token, "Bruno Dias", "2021002").await;
    h.attend(&roster, &roster.student_id, 5, &["2025-03-07"]).await;
    h.attend(&roster, &other, 7, &["2025-03-08"]).await;

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({ "matricula": "9999999" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "not_found" }));

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({ "matricula": " 2021001 " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student"]["matricula"], "2021001");
    assert_eq!(body["participations"].as_array().unwrap().len(), 1);
    assert_eq!(body["participations"][0]["total_hours"], 5);
    assert_eq!(body["participations"][0]["project"]["name"], "Robótica nas Escolas");
    let records = body["attendanceRecords"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["date"], "2025-03-07");
    assert!(!body.to_string().contains("2021002"));
}

#[tokio::test]
async fn report_download_is_a_text_attachment() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    h.attend(&roster, &roster.student_id, 6, &["2025-03-07", "2025-03-14"])
        .await;

    let response = h
        .raw(
            Method::POST,
            "/functions/get-student-report/download",
            None,
            Some(json!({ "matricula": "2021001" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"relatorio_2021001_"));
    assert!(disposition.ends_with(".txt\""));

    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("RELATÓRIO DE HORAS COMPLEMENTARES\n"));
    assert!(text.contains("- Robótica nas Escolas: 12h"));
    assert!(text.contains("TOTAL GERAL DE HORAS: 12h"));
    assert!(text.contains("14/03/2025 - 6h - Atividade registrada"));

    let uri = format!("/students/{}/report", roster.student_id);
    let (status, _) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let response = h.raw(Method::GET, &uri, Some(&roster.token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn referenced_students_need_an_explicit_cascade() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    h.attend(&roster, &roster.student_id, 2, &["2025-03-07"]).await;

    let uri = format!("/students/{}", roster.student_id);
    let (status, body) = h.call(Method::DELETE, &uri, Some(&roster.token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = h
        .call(
            Method::DELETE,
            &format!("{}?cascade=true", uri),
            Some(&roster.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cascaded"], true);

    let (status, _) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({ "matricula": "2021001" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/projects/{}", roster.project_id),
            Some(&roster.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    let (status, body) = h
        .call(
            Method::POST,
            "/students",
            Some(&roster.token),
            Some(json!({ "name": "Outra Ana", "matricula": "2021001" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn coordinators_only_see_their_own_projects() {
    let h = Harness::new().await;
    let mine = h
        .coordinator_with_roster("mine@example.com", "2021001")
        .await;
    let theirs = h
        .coordinator_with_roster("theirs@example.com", "2021002")
        .await;

    let (_, body) = h
        .call(Method::GET, "/projects", Some(&mine.token), None)
        .await;
    assert_eq!(body["projects"].as_array().unwrap().len(), 1);
    assert_eq!(body["projects"][0]["id"].as_str().unwrap(), mine.project_id);

    let (status, _) = h
        .call(
            Method::POST,
            "/attendance",
            Some(&mine.token),
            Some(json!({
                "project_id": theirs.project_id,
                "student_id": mine.student_id,
                "hours": 2,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let h = Harness::new().await;
    let (status, body) = h.call(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn malformed_requests_get_json_validation_errors() {
    let h = Harness::new().await;

    let response = h
        .send(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some("not json".to_string()),
        )
        .await;
    let (status, body) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(!body.to_string().contains("expected"));

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({ "matricula": true })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(!body.to_string().contains("invalid type"));

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD, "role": "student" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    let (status, body) = h
        .call(Method::DELETE, "/students/not-a-uuid", Some(&roster.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = h
        .call(
            Method::GET,
            "/participations?status=archived",
            Some(&roster.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn numeric_registration_finds_the_student() {
    let h = Harness::new().await;
    let roster = h
        .coordinator_with_roster("coord@example.com", "2021001")
        .await;
    h.attend(&roster, &roster.student_id, 3, &["2025-03-07"]).await;

    let (status, body) = h
        .call(
            Method::POST,
            "/functions/get-student-report",
            None,
            Some(json!({ "matricula": 2021001 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["student"]["matricula"], "2021001");
    assert_eq!(body["participations"][0]["total_hours"], 3);
}

#[tokio::test]
async fn issued_credentials_lapse_with_an_expired_session() {
    let config = Config {
        session_ttl: chrono::Duration::seconds(2),
        ..Config::default()
    };
    let h = Harness::with_config(config).await;

    let stale = h.admin().await;
    let (status, _) = h.create_coordinator(&stale, "one@example.com").await;
    assert_eq!(status, StatusCode::OK);
    tokio::time::sleep(std::time::Duration::from_millis(2200)).await;

    assert!(h.state.handoff.list(&token_hash(&stale)).await.is_empty());

    let fresh = h.admin().await;
    let (status, _) = h.create_coordinator(&fresh, "two@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.state.handoff.held_sessions().await, 1);

    let (_, body) = h
        .call(Method::GET, "/credentials", Some(&fresh), None)
        .await;
    let credentials = body["credentials"].as_array().unwrap();
    assert_eq!(credentials.len(), 1);
    assert_eq!(credentials[0]["email"], "two@example.com");
}

#[tokio::test]
async fn admins_edit_coordinator_profiles() {
    let h = Harness::new().await;
    let admin = h.admin().await;
    h.create_coordinator(&admin, "c@example.com").await;

    let (_, body) = h
        .call(Method::GET, "/coordinators", Some(&admin), None)
        .await;
    let id = body["coordinators"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/coordinators/{}", id);

    let (status, body) = h
        .call(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "name": " Maria Souza ", "department": "Direito" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["coordinator"]["name"], "Maria Souza");
    assert_eq!(body["coordinator"]["department"], "Direito");
    assert_eq!(body["coordinator"]["email"], "c@example.com");

    let (status, body) = h
        .call(
            Method::PUT,
            &uri,
            Some(&admin),
            Some(json!({ "name": "  " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let coordinator = h.token("c@example.com", "coord-pass", "coordinator").await;
    let (status, body) = h
        .call(
            Method::PUT,
            &uri,
            Some(&coordinator),
            Some(json!({ "name": "Self Promoted" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("/coordinators/{}", MISSING_ID),
            Some(&admin),
            Some(json!({ "name": "Ninguém" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, body) = h
        .call(Method::GET, "/coordinators?search=souza", Some(&admin), None)
        .await;
    assert_eq!(body["coordinators"][0]["name"], "Maria Souza");
}

#[tokio::test]
async fn coordinators_edit_only_their_own_projects() {
    let h = Harness::new().await;
    let mine = h
        .coordinator_with_roster("mine@example.com", "2021001")
        .await;
    let theirs = h
        .coordinator_with_roster("theirs@example.com", "2021002")
        .await;

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("/projects/{}", mine.project_id),
            Some(&mine.token),
            Some(json!({ "name": "Horta Comunitária", "description": "Sábados" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["project"]["name"], "Horta Comunitária");
    assert_eq!(body["project"]["description"], "Sábados");

    let (status, body) = h
        .call(
            Method::PUT,
            &format!("/projects/{}", theirs.project_id),
            Some(&mine.token),
            Some(json!({ "name": "Taken Over" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = h
        .call(
            Method::PUT,
            &format!("/projects/{}", MISSING_ID),
            Some(&mine.token),
            Some(json!({ "name": "Nowhere" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = h
        .call(Method::GET, "/projects", Some(&theirs.token), None)
        .await;
    assert_eq!(body["projects"][0]["name"], "Robótica nas Escolas");
}
