//! Integration tests for reportchat.
//! These tests run the HTTP client against an in-process fake backend.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;

    use reportchat::chat::{APOLOGY, ChatConfig, ChatController, SubmitOutcome};
    use reportchat::render::Transcript;
    use reportchat::report::{ReportOutcome, ReportQuery, generate_report};
    use reportchat::{Backend, ConversationTurn, Error, Role};

    #[derive(Clone, Default)]
    struct Recorded {
        consults: Arc<Mutex<Vec<Value>>>,
        searches: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    async fn consult(
        State(recorded): State<Recorded>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        recorded.consults.lock().unwrap().push(body.clone());
        let query = body["query"].as_str().unwrap_or_default().to_string();
        match query.as_str() {
            "fail" => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "model offline"})),
            ),
            "blank" => (StatusCode::OK, Json(json!({"response": ""}))),
            _ => (
                StatusCode::OK,
                Json(json!({"response": format!("**Echo:** {query}")})),
            ),
        }
    }

    async fn search(
        State(recorded): State<Recorded>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        recorded.searches.lock().unwrap().push(params.clone());
        match params.get("asunto").map(String::as_str) {
            None | Some("") => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "El parámetro 'asunto' es requerido"})),
            ),
            Some("nothing") => (
                StatusCode::OK,
                Json(json!({
                    "resumen_consolidado": "No se encontraron correos.",
                    "mensaje_general": "No emails matched those filters."
                })),
            ),
            Some("broken") => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "mail server unreachable"})),
            ),
            Some(subject) => (
                StatusCode::OK,
                Json(json!({
                    "resumen_consolidado": format!("Three emails about {subject}."),
                    "total_correos": 3
                })),
            ),
        }
    }

    async fn spawn_backend() -> (String, Recorded) {
        let recorded = Recorded::default();
        let app = Router::new()
            .route("/api/asistente_consulta", post(consult))
            .route("/api/buscar_correos", get(search))
            .with_state(recorded.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), recorded)
    }

    fn controller(base_url: &str) -> ChatController<Backend, Transcript> {
        let backend =
            Backend::with_options(Some(base_url.to_string()), Some(Duration::from_secs(5)))
                .unwrap();
        let config = ChatConfig::new().with_typing_delay(Duration::from_millis(10));
        ChatController::new(backend, Transcript::new(), config)
    }

    async fn load_report(controller: &ChatController<Backend, Transcript>, subject: &str) {
        let query = ReportQuery::new(subject).unwrap();
        let outcome = generate_report(controller.backend(), &query).await.unwrap();
        let ReportOutcome::Generated { data, .. } = outcome else {
            panic!("expected a generated report, got {outcome:?}");
        };
        controller.set_analysis_data(data);
    }

    #[tokio::test]
    async fn report_then_question() {
        let (base_url, recorded) = spawn_backend().await;
        let controller = controller(&base_url);
        let cancel = CancellationToken::new();

        let query = ReportQuery::parse("Outage", Some("2024-05-01"), None).unwrap();
        let outcome = generate_report(controller.backend(), &query).await.unwrap();
        let ReportOutcome::Generated {
            summary,
            total_emails,
            data,
        } = outcome
        else {
            panic!("expected a generated report");
        };
        assert_eq!(summary, "Three emails about Outage.");
        assert_eq!(total_emails, 3);
        controller.set_analysis_data(data);

        {
            let searches = recorded.searches.lock().unwrap();
            assert_eq!(searches.len(), 1);
            assert_eq!(searches[0]["asunto"], "Outage");
            assert_eq!(searches[0]["fecha_desde"], "2024-05-01");
            assert_eq!(searches[0]["fecha_hasta"], "");
        }

        let outcome = controller
            .submit_user_message("What broke?", &cancel)
            .await;
        assert!(outcome.is_answered(), "{outcome:?}");

        let consults = recorded.consults.lock().unwrap().clone();
        assert_eq!(consults.len(), 1);
        assert_eq!(consults[0]["query"], "What broke?");
        assert_eq!(consults[0]["context"], json!([]));
        assert_eq!(consults[0]["analysisData"]["tipo"], "informe_correo");
        assert_eq!(
            consults[0]["analysisData"]["contenido"],
            "Three emails about Outage."
        );

        let turns = controller.view().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);
        assert!(turns[1].html.contains("<strong>Echo:</strong>"), "{}", turns[1].html);
        assert_eq!(
            controller.history(),
            vec![
                ConversationTurn::user("What broke?"),
                ConversationTurn::assistant("**Echo:** What broke?"),
            ]
        );
    }

    #[tokio::test]
    async fn question_without_report_never_reaches_backend() {
        let (base_url, recorded) = spawn_backend().await;
        let controller = controller(&base_url);

        let outcome = controller
            .submit_user_message("Anything new?", &CancellationToken::new())
            .await;
        assert!(matches!(outcome, SubmitOutcome::NoReport));
        assert!(recorded.consults.lock().unwrap().is_empty());
        assert_eq!(controller.view().turns().len(), 2);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn server_error_becomes_apology_turn() {
        let (base_url, recorded) = spawn_backend().await;
        let controller = controller(&base_url);
        load_report(&controller, "Outage").await;

        let outcome = controller
            .submit_user_message("fail", &CancellationToken::new())
            .await;
        let SubmitOutcome::Failed(err) = outcome else {
            panic!("expected a failure");
        };
        assert!(matches!(err, Error::InternalServer { .. }), "{err:?}");
        assert_eq!(err.status_code(), Some(500));

        let turns = controller.view().turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].source.starts_with(APOLOGY));
        assert!(turns[1].source.contains("model offline"));
        assert_eq!(controller.view().typing_count(), 0);
        assert!(controller.history().is_empty());
        assert_eq!(recorded.consults.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_becomes_apology_turn() {
        // Bind and release a port so nothing is listening on it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let controller = controller(&format!("http://{addr}"));
        controller.set_analysis_data(reportchat::AnalysisData::email_report(
            "Outage",
            "Three emails about Outage.",
            3,
        ));

        let outcome = controller
            .submit_user_message("What broke?", &CancellationToken::new())
            .await;
        let SubmitOutcome::Failed(err) = outcome else {
            panic!("expected a failure");
        };
        assert!(err.is_connection(), "{err:?}");

        let turns = controller.view().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert!(turns[1].source.starts_with(APOLOGY));
        assert_eq!(controller.view().typing_count(), 0);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn blank_reply_is_a_failure() {
        let (base_url, _recorded) = spawn_backend().await;
        let controller = controller(&base_url);
        load_report(&controller, "Outage").await;

        let outcome = controller
            .submit_user_message("blank", &CancellationToken::new())
            .await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn context_carries_only_the_last_four_turns() {
        let (base_url, recorded) = spawn_backend().await;
        let controller = controller(&base_url);
        load_report(&controller, "Outage").await;
        let cancel = CancellationToken::new();

        for question in ["one", "two", "three"] {
            let outcome = controller.submit_user_message(question, &cancel).await;
            assert!(outcome.is_answered());
        }

        let consults = recorded.consults.lock().unwrap().clone();
        assert_eq!(consults.len(), 3);
        assert_eq!(consults[1]["context"].as_array().unwrap().len(), 2);
        assert_eq!(
            consults[2]["context"],
            json!([
                {"role": "user", "content": "one"},
                {"role": "assistant", "content": "**Echo:** one"},
                {"role": "user", "content": "two"},
                {"role": "assistant", "content": "**Echo:** two"},
            ])
        );
        assert_eq!(controller.history().len(), 6);
    }

    #[tokio::test]
    async fn report_without_matches() {
        let (base_url, _recorded) = spawn_backend().await;
        let backend = Backend::with_options(Some(base_url), None).unwrap();

        let query = ReportQuery::new("nothing").unwrap();
        let outcome = generate_report(&backend, &query).await.unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::NoResults("No emails matched those filters.".to_string())
        );
    }

    #[tokio::test]
    async fn report_backend_failure() {
        let (base_url, _recorded) = spawn_backend().await;
        let backend = Backend::with_options(Some(base_url), None).unwrap();

        let query = ReportQuery::new("broken").unwrap();
        let err = generate_report(&backend, &query).await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnavailable { .. }), "{err:?}");
        assert!(err.to_string().contains("mail server unreachable"));
    }

    #[tokio::test]
    async fn invalid_report_query_sends_nothing() {
        let (_base_url, recorded) = spawn_backend().await;
        assert!(ReportQuery::parse(" ", None, None).unwrap_err().is_validation());
        assert!(
            ReportQuery::parse("Outage", Some("2024-05-31"), Some("2024-05-01"))
                .unwrap_err()
                .is_validation()
        );
        assert!(recorded.searches.lock().unwrap().is_empty());
    }
}
