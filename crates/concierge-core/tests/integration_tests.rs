//! Integration tests for concierge-core
//!
//! These tests exercise the full profile → transactions → analyze → persist
//! workflow, including the LLM path against a mock Messages API server.

use axum::http::StatusCode;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use concierge_core::{
    models::{
        InteractionAction, NewTransaction, Preferences, ProfileUpdate, SuggestionContext,
        SuggestionStatus, SuggestionType,
    },
    test_utils::MockLlmServer,
    Database, EngineConfig, SuggestionEngine,
};

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// "Today" for the Maria scenario: five days before her birthday
fn today() -> NaiveDateTime {
    at(2026, 5, 10)
}

/// A user married to Maria (born 15/05) who dined at Fasano around her
/// birthday in two of the last three years and fills up at Shell every
/// 30 days
fn seed_maria(db: &Database) -> i64 {
    let user_id = db.create_user("joao", "joao@example.com").unwrap();
    db.update_profile(
        user_id,
        &ProfileUpdate {
            name: Some("João".to_string()),
            spouse_name: Some("Maria".to_string()),
            spouse_birth_date: NaiveDate::from_ymd_opt(1991, 5, 15),
            ..Default::default()
        },
        at(2026, 1, 2),
    )
    .unwrap();

    // Three restaurant visits around her birthday, two of them at Fasano
    for (place, cents, (y, m, d)) in [
        ("D.O.M.", 30000, (2023, 5, 15)),
        ("Fasano", 45000, (2024, 5, 14)),
        ("Fasano", 45000, (2025, 5, 16)),
    ] {
        db.insert_transaction(&NewTransaction::expense(
            user_id,
            Decimal::new(cents, 2),
            "restaurant",
            place,
            at(y, m, d),
        ))
        .unwrap();
    }

    for i in 0..6 {
        db.insert_transaction(&NewTransaction::expense(
            user_id,
            Decimal::new(25000, 2),
            "gas",
            "Shell",
            today() - Duration::days(28 + 30 * i),
        ))
        .unwrap();
    }

    user_id
}

// =============================================================================
// Rule-based path
// =============================================================================

#[tokio::test]
async fn test_maria_fasano_end_to_end() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let drafts = engine.analyze_user_at(user_id, today()).await.unwrap();
    assert_eq!(drafts.len(), 2);

    let anniversary = &drafts[0];
    assert_eq!(anniversary.suggestion_type, SuggestionType::Anniversary);
    assert_eq!(anniversary.priority, 5);
    assert!(anniversary.content.contains("Maria"));
    assert!(anniversary.content.contains("Fasano"));
    assert_eq!(
        anniversary.scheduled_date,
        NaiveDate::from_ymd_opt(2026, 5, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    );
    assert_eq!(
        anniversary.context,
        SuggestionContext::SpecialDate {
            person: Some("Maria".to_string()),
            occasion: "birthday".to_string(),
            days_until: 5,
            suggested_restaurant: Some("Fasano".to_string()),
        }
    );

    let routine = &drafts[1];
    assert_eq!(routine.suggestion_type, SuggestionType::Routine);
    assert!(routine.content.contains("abastecer no Shell"));
}

#[tokio::test]
async fn test_persisted_context_decodes_to_draft_context() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let drafts = engine.analyze_user_at(user_id, today()).await.unwrap();
    let ids = engine.persist_drafts(user_id, &drafts, today()).unwrap();
    assert_eq!(ids.len(), drafts.len());

    for (id, draft) in ids.iter().zip(&drafts) {
        let stored = engine.db().get_suggestion(*id).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Pending);
        assert_eq!(stored.priority, draft.priority);
        assert_eq!(stored.context(), Some(draft.context.clone()));
    }
}

#[tokio::test]
async fn test_second_run_does_not_duplicate() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let first = engine.analyze_and_persist(user_id, today()).await.unwrap();
    assert_eq!(first.len(), 2);

    // Later the same day, and the next day: nothing new
    let again = engine
        .analyze_and_persist(user_id, today() + Duration::hours(4))
        .await
        .unwrap();
    assert!(again.is_empty());
    let tomorrow = engine
        .analyze_and_persist(user_id, today() + Duration::days(1))
        .await
        .unwrap();
    assert!(tomorrow.is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_for_same_user_insert_once() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let (a, b) = tokio::join!(
        engine.analyze_and_persist(user_id, today()),
        engine.analyze_and_persist(user_id, today())
    );
    assert_eq!(a.unwrap().len() + b.unwrap().len(), 2);
    assert_eq!(
        engine
            .db()
            .list_suggestions(user_id, None, 50)
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_disabled_types_are_dropped() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let mut prefs = Preferences::default();
    prefs
        .suggestion_categories
        .insert("anniversary".to_string(), false);
    let change = engine
        .update_preferences(user_id, &prefs, today())
        .await
        .unwrap();
    assert!(!change.profile.preferences.allows(SuggestionType::Anniversary));

    // The re-run persisted only the routine reminder
    assert_eq!(change.inserted.len(), 1);
    let stored = engine
        .db()
        .get_suggestion(change.inserted[0])
        .unwrap()
        .unwrap();
    assert_eq!(stored.suggestion_type, SuggestionType::Routine);
}

#[tokio::test]
async fn test_profile_update_triggers_generation() {
    let db = Database::in_memory().unwrap();
    let user_id = db.create_user("bia", "bia@example.com").unwrap();
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    // Own birthday tomorrow
    let change = engine
        .update_profile(
            user_id,
            &ProfileUpdate {
                birth_date: NaiveDate::from_ymd_opt(1995, 5, 11),
                ..Default::default()
            },
            today(),
        )
        .await
        .unwrap();
    assert_eq!(change.inserted.len(), 1);

    let stored = engine
        .db()
        .get_suggestion(change.inserted[0])
        .unwrap()
        .unwrap();
    assert_eq!(stored.suggestion_type, SuggestionType::Seasonal);
    assert_eq!(stored.priority, 3);
    assert!(stored.content.starts_with("Amanhã é seu aniversário!"));
}

#[tokio::test]
async fn test_analyze_all_skips_inactive_users() {
    let db = Database::in_memory().unwrap();
    seed_maria(&db);
    let idle = db.create_user("idle", "idle@example.com").unwrap();
    let gone = db.create_user("gone", "gone@example.com").unwrap();
    db.set_user_active(gone, false).unwrap();
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);

    let report = engine.analyze_all(today()).await.unwrap();
    assert_eq!(report.users, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);
    assert!(engine
        .db()
        .list_suggestions(idle, None, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_lifecycle_after_generation() {
    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let engine = SuggestionEngine::with_llm(db, EngineConfig::rules_only(), None);
    let ids = engine.analyze_and_persist(user_id, today()).await.unwrap();

    let db = engine.db();
    db.apply_interaction(user_id, ids[0], InteractionAction::Accepted, None, None, today())
        .unwrap();
    db.apply_interaction(user_id, ids[1], InteractionAction::Rejected, Some("já abasteci"), None, today())
        .unwrap();

    let stats = db.suggestion_stats(user_id).unwrap();
    assert_eq!(stats.total, 2);
    assert!((stats.acceptance_rate - 0.5).abs() < 1e-9);
}

// =============================================================================
// LLM path (mock Messages API)
// =============================================================================

fn llm_config(server: &MockLlmServer, key: &str) -> EngineConfig {
    let mut config = EngineConfig {
        api_key: Some(key.to_string()),
        ..EngineConfig::default()
    };
    config.llm.base_url = server.url();
    config.llm.timeout_secs = 5;
    config
}

#[tokio::test]
async fn test_invalid_credential_matches_rules_only() {
    let server = MockLlmServer::with_status(StatusCode::UNAUTHORIZED).await;

    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);

    let rules_only = SuggestionEngine::with_llm(db.clone(), EngineConfig::rules_only(), None);
    let expected = rules_only.analyze_user_at(user_id, today()).await.unwrap();

    let engine = SuggestionEngine::new(db, llm_config(&server, "sk-invalid")).unwrap();
    assert!(engine.llm_active());
    let got = engine.analyze_user_at(user_id, today()).await.unwrap();
    assert_eq!(got, expected);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].api_key.as_deref(), Some("sk-invalid"));
    assert_eq!(requests[0].anthropic_version.as_deref(), Some("2023-06-01"));
}

#[tokio::test]
async fn test_llm_suggestions_merge_with_special_dates() {
    let reply = r#"Claro! Seguem as sugestões:
{"suggestions": [
  {"type": "saving", "content": "Você gastou R$ 1.500 com combustível nos últimos meses. Que tal avaliar o transporte por aplicativo?", "priority": 6, "reasoning": "gasto alto com gasolina", "category": "transporte"},
  {"type": "health", "content": "Que tal agendar um check-up neste mês?", "priority": 15},
  {"type": "purchase", "content": "", "priority": 9}
]}"#;
    let server = MockLlmServer::with_text(reply).await;

    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let config = llm_config(&server, "sk-valid");
    let model = config.llm.model.clone();
    let engine = SuggestionEngine::new(db, config).unwrap();

    let drafts = engine.analyze_user_at(user_id, today()).await.unwrap();
    let types: Vec<_> = drafts.iter().map(|d| d.suggestion_type).collect();
    assert_eq!(
        types,
        vec![
            SuggestionType::Routine,
            SuggestionType::Savings,
            SuggestionType::Anniversary
        ]
    );
    assert_eq!(drafts[0].priority, 10);
    assert_eq!(drafts[0].scheduled_date, today());
    match &drafts[1].context {
        SuggestionContext::Generated {
            generated_by,
            model: used,
            category,
            ..
        } => {
            assert_eq!(generated_by, "claude");
            assert_eq!(used, &model);
            assert_eq!(category, "transporte");
        }
        other => panic!("unexpected context {:?}", other),
    }

    let body = &server.requests()[0].body;
    assert_eq!(body["model"], model.as_str());
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(body["messages"][0]["role"], "user");
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("- Cônjuge: Maria (aniversário: 15/05)"));
    assert!(prompt.contains("gere 5 sugestões"));
}

#[tokio::test]
async fn test_refine_through_mock_server() {
    let server = MockLlmServer::with_text("Que tal reservar uma mesa no Kinoshita para a Maria?").await;

    let db = Database::in_memory().unwrap();
    let user_id = seed_maria(&db);
    let rules_only = SuggestionEngine::with_llm(db.clone(), EngineConfig::rules_only(), None);
    let ids = rules_only.analyze_and_persist(user_id, today()).await.unwrap();

    let engine = SuggestionEngine::new(db, llm_config(&server, "sk-valid")).unwrap();
    let refined = engine
        .refine(user_id, ids[0], "ela prefere comida japonesa")
        .await
        .unwrap();
    assert_eq!(
        refined.as_deref(),
        Some("Que tal reservar uma mesa no Kinoshita para a Maria?")
    );

    let body = &server.requests()[0].body;
    assert_eq!(body["max_tokens"], 200);
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("Feedback do usuário: ela prefere comida japonesa"));

    // The stored suggestion is untouched
    let stored = engine.db().get_suggestion(ids[0]).unwrap().unwrap();
    assert!(stored.content.contains("Fasano"));
}
