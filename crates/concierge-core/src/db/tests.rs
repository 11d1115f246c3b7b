//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn draft(content: &str, scheduled: NaiveDateTime) -> SuggestionDraft {
        SuggestionDraft::new(
            SuggestionType::Routine,
            content,
            Priority::Low.value(),
            scheduled,
            SuggestionContext::Recurring {
                description: "Shell".to_string(),
                category: "gas".to_string(),
                frequency: 6,
                average_interval_days: 30.0,
                days_since_last: 28,
            },
        )
    }

    fn user(db: &Database) -> i64 {
        db.create_user("ana", "ana@example.com").unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_users(false).unwrap().is_empty());
    }

    #[test]
    fn test_schema_has_unique_draft_index() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_suggestions_unique_draft'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_user_crud() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        assert!(db.create_user("ana", "other@example.com").is_err());
        assert!(db.create_user("  ", "x@example.com").is_err());

        let fetched = db.get_user_by_username("ana").unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert!(fetched.active);

        // Every user starts with a default profile
        let profile = db.get_profile(id).unwrap().unwrap();
        assert_eq!(profile.preferences, Preferences::default());

        db.set_user_active(id, false).unwrap();
        assert!(db.list_users(true).unwrap().is_empty());
        assert_eq!(db.list_users(false).unwrap().len(), 1);

        db.delete_user(id).unwrap();
        assert!(db.get_user(id).unwrap().is_none());
        assert!(matches!(db.delete_user(id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete_user_cascades() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let tx_id = db
            .insert_transaction(&NewTransaction::expense(
                id,
                Decimal::new(1000, 2),
                "gas",
                "Shell",
                at(2026, 1, 5, 10),
            ))
            .unwrap();
        db.delete_user(id).unwrap();
        assert!(db.get_transaction(tx_id).unwrap().is_none());
        assert!(db.get_profile(id).unwrap().is_none());
    }

    #[test]
    fn test_transaction_amount_round_trip() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let tx_id = db
            .insert_transaction(&NewTransaction {
                location: Some("São Paulo".to_string()),
                metadata: Some(serde_json::json!({"card": "visa"})),
                ..NewTransaction::expense(
                    id,
                    Decimal::new(123456, 3),
                    "restaurant",
                    "Fasano",
                    at(2026, 2, 14, 20),
                )
            })
            .unwrap();

        let tx = db.get_transaction(tx_id).unwrap().unwrap();
        assert_eq!(tx.amount, Decimal::new(12346, 2));
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.location.as_deref(), Some("São Paulo"));
        assert_eq!(tx.metadata.unwrap()["card"], "visa");
        assert_eq!(tx.date, at(2026, 2, 14, 20));
    }

    #[test]
    fn test_profile_update_is_audited() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 3, 1, 9);

        let update = ProfileUpdate {
            name: Some("Ana".to_string()),
            spouse_name: Some("Maria".to_string()),
            spouse_birth_date: NaiveDate::from_ymd_opt(1991, 5, 15),
            ..Default::default()
        };
        let profile = db.update_profile(id, &update, now).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.spouse().map(|(n, _)| n), Some("Maria"));

        // Fields left out are kept
        let profile = db
            .update_profile(
                id,
                &ProfileUpdate {
                    phone: Some("11 99999-0000".to_string()),
                    ..Default::default()
                },
                now,
            )
            .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Ana"));

        let audits: Vec<_> = db
            .list_transactions(id, 10)
            .unwrap()
            .into_iter()
            .filter(|t| t.category == PROFILE_UPDATE_CATEGORY)
            .collect();
        assert_eq!(audits.len(), 2);
        assert!(audits
            .iter()
            .all(|t| t.amount.is_zero() && t.transaction_type == TransactionType::System));
        let fields = &audits
            .iter()
            .find(|t| t.metadata.as_ref().unwrap()["fields"].as_array().unwrap().len() == 3)
            .unwrap()
            .metadata;
        assert_eq!(fields.as_ref().unwrap()["fields"][0], "name");

        // Audit records are not spending
        assert!(db.list_all_spending(id).unwrap().is_empty());
    }

    #[test]
    fn test_update_preferences() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let mut prefs = Preferences::default();
        prefs
            .suggestion_categories
            .insert("routine".to_string(), false);
        prefs.categories_of_interest = vec!["viagem".to_string()];

        db.update_preferences(id, &prefs, at(2026, 3, 1, 9)).unwrap();
        let stored = db.get_profile(id).unwrap().unwrap().preferences;
        assert_eq!(stored, prefs);
        assert!(!stored.allows(SuggestionType::Routine));

        let audits = db.list_transactions(id, 10).unwrap();
        assert_eq!(audits[0].category, PREFERENCES_UPDATE_CATEGORY);

        assert!(matches!(
            db.update_preferences(999, &prefs, at(2026, 3, 1, 9)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_recurring_groups() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 6, 1, 12);
        for days in [5, 35, 65] {
            db.insert_transaction(&NewTransaction::expense(
                id,
                Decimal::new(5000, 2),
                "gas",
                "Shell",
                now - Duration::days(days),
            ))
            .unwrap();
        }
        // Too old for the window
        db.insert_transaction(&NewTransaction::expense(
            id,
            Decimal::new(5000, 2),
            "gas",
            "Shell",
            now - Duration::days(300),
        ))
        .unwrap();
        db.insert_transaction(&NewTransaction::expense(
            id,
            Decimal::new(9000, 2),
            "restaurant",
            "Fasano",
            now - Duration::days(10),
        ))
        .unwrap();

        let groups = db
            .recurring_groups(id, now - Duration::days(180), 3)
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].description, "Shell");
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].last_date, (now - Duration::days(5)).date());
    }

    #[test]
    fn test_transactions_between_and_spending() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        for (day, cents) in [(2, 1000), (10, 2550), (20, 500)] {
            db.insert_transaction(&NewTransaction::expense(
                id,
                Decimal::new(cents, 2),
                "grocery",
                "Pão de Açúcar",
                at(2026, 4, day, 10),
            ))
            .unwrap();
        }
        db.insert_transaction(&NewTransaction {
            transaction_type: TransactionType::Income,
            ..NewTransaction::expense(id, Decimal::new(500000, 2), "salary", "ACME", at(2026, 4, 5, 9))
        })
        .unwrap();

        let between = db
            .list_transactions_between(id, at(2026, 4, 1, 0), at(2026, 4, 15, 0))
            .unwrap();
        assert_eq!(between.len(), 3);
        assert!(between.windows(2).all(|w| w[0].date <= w[1].date));

        let (count, total) = db.spending_since(id, at(2026, 4, 1, 0)).unwrap();
        assert_eq!(count, 3);
        assert_eq!(total, Decimal::new(4050, 2));

        let matching = db
            .list_transactions_matching(id, "grocery", Some("Pão de Açúcar"))
            .unwrap();
        assert_eq!(matching.len(), 3);
        assert!(db
            .list_transactions_matching(id, "grocery", Some("Carrefour"))
            .unwrap()
            .is_empty());
        assert_eq!(
            db.list_transactions_matching(id, "salary", None).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_insert_suggestion_is_idempotent_per_day() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 5, 10, 9);

        let first = db
            .insert_suggestion(id, &draft("Hora de abastecer?", now), now)
            .unwrap();
        assert!(first.is_some());

        // Same type, day and content: ignored
        let again = db
            .insert_suggestion(id, &draft("hora de  abastecer?", now + Duration::hours(3)), now)
            .unwrap();
        assert!(again.is_none());

        // Next day is a new suggestion
        let next_day = db
            .insert_suggestion(id, &draft("Hora de abastecer?", now + Duration::days(1)), now)
            .unwrap();
        assert!(next_day.is_some());

        let stored = db.get_suggestion(first.unwrap()).unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::Pending);
        assert_eq!(
            stored.context(),
            Some(draft("Hora de abastecer?", now).context)
        );
    }

    #[test]
    fn test_has_active_suggestion_filters() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 5, 10, 9);
        let d = draft("Hora de abastecer?", now);
        db.insert_suggestion(id, &d, now).unwrap();

        let live = || SuggestionMatch::live(id, SuggestionType::Routine);
        assert!(db.has_active_suggestion(&live()).unwrap());
        assert!(db
            .has_active_suggestion(&live().scheduled_on(now.date()))
            .unwrap());
        assert!(!db
            .has_active_suggestion(&live().scheduled_on(now.date() + Duration::days(1)))
            .unwrap());
        assert!(db
            .has_active_suggestion(&live().with_content_hash(d.content_hash()))
            .unwrap());
        assert!(!db
            .has_active_suggestion(&live().created_since(now + Duration::days(1)))
            .unwrap());
        assert!(db
            .has_active_suggestion(&live().context_eq("$.description", "Shell"))
            .unwrap());
        assert!(!db
            .has_active_suggestion(&live().context_eq("$.description", "Ipiranga"))
            .unwrap());
        assert!(!db
            .has_active_suggestion(&SuggestionMatch::live(id, SuggestionType::Seasonal))
            .unwrap());

        assert!(db.has_suggestion_with_content(id, "Hora de abastecer?").unwrap());
        assert!(!db.has_suggestion_with_content(id, "hora de abastecer?").unwrap());
    }

    #[test]
    fn test_interaction_lifecycle() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 5, 10, 9);
        let sid = db
            .insert_suggestion(id, &draft("Hora de abastecer?", now), now)
            .unwrap()
            .unwrap();

        // Viewing only logs
        let s = db
            .apply_interaction(id, sid, InteractionAction::Viewed, None, None, now)
            .unwrap();
        assert_eq!(s.status, SuggestionStatus::Pending);

        // Snooze needs positive hours
        assert!(matches!(
            db.apply_interaction(id, sid, InteractionAction::Snoozed, None, Some(0), now),
            Err(Error::InvalidTransition(_))
        ));
        let s = db
            .apply_interaction(id, sid, InteractionAction::Snoozed, None, Some(24), now)
            .unwrap();
        assert_eq!(s.status, SuggestionStatus::Snoozed);
        assert_eq!(s.scheduled_date, now + Duration::hours(24));

        let s = db
            .apply_interaction(id, sid, InteractionAction::Accepted, Some("ótimo"), None, now)
            .unwrap();
        assert_eq!(s.status, SuggestionStatus::Accepted);

        let s = db
            .apply_interaction(id, sid, InteractionAction::Executed, None, None, now)
            .unwrap();
        assert_eq!(s.status, SuggestionStatus::Executed);
        assert!(s.executed_at.is_some());

        // Terminal
        assert!(matches!(
            db.apply_interaction(id, sid, InteractionAction::Rejected, None, None, now),
            Err(Error::InvalidTransition(_))
        ));

        // Another user's suggestion is invisible
        let other = db.create_user("bia", "bia@example.com").unwrap();
        assert!(matches!(
            db.apply_interaction(other, sid, InteractionAction::Viewed, None, None, now),
            Err(Error::NotFound(_))
        ));

        let log = db.list_interactions(id, None, 10).unwrap();
        assert_eq!(log.len(), 4);
        let snooze = db
            .list_interactions(id, Some(InteractionAction::Snoozed), 10)
            .unwrap();
        assert_eq!(snooze[0].extra_data.as_ref().unwrap()["snooze_hours"], 24);

        let counts = db.interaction_counts(id, None).unwrap();
        assert_eq!(counts.get("accepted"), Some(&1));
        assert_eq!(db.last_interaction_at(id).unwrap(), Some(now));
    }

    #[test]
    fn test_snooze_onto_day_of_identical_suggestion() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 5, 10, 9);
        let first = db
            .insert_suggestion(id, &draft("Hora de abastecer?", now), now)
            .unwrap()
            .unwrap();
        db.apply_interaction(id, first, InteractionAction::Snoozed, None, Some(12), now)
            .unwrap();

        // Snoozed content is still live
        assert!(db.has_suggestion_with_content(id, "Hora de abastecer?").unwrap());

        let next_day = now + Duration::days(1);
        let second = db
            .insert_suggestion(id, &draft("Hora de abastecer?", next_day), now)
            .unwrap();
        assert!(second.is_some());

        // Moves scheduled_at onto the second row's day
        let s = db
            .apply_interaction(id, first, InteractionAction::Snoozed, None, Some(24), now)
            .unwrap();
        assert_eq!(s.status, SuggestionStatus::Snoozed);
        assert_eq!(s.scheduled_date, next_day);

        // The insert-time day still dedups the original slot
        let again = db
            .insert_suggestion(id, &draft("Hora de abastecer?", now), now)
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn test_expire_overdue_suggestions() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        let now = at(2026, 5, 10, 9);
        let old = db
            .insert_suggestion(id, &draft("antiga", now - Duration::days(3)), now)
            .unwrap()
            .unwrap();
        let fresh = db
            .insert_suggestion(id, &draft("nova", now + Duration::days(1)), now)
            .unwrap()
            .unwrap();

        assert!(db.get_suggestion(old).unwrap().unwrap().is_overdue(now));
        assert_eq!(db.expire_overdue_suggestions(Some(id), now).unwrap(), 1);
        assert_eq!(
            db.get_suggestion(old).unwrap().unwrap().status,
            SuggestionStatus::Expired
        );
        assert_eq!(
            db.get_suggestion(fresh).unwrap().unwrap().status,
            SuggestionStatus::Pending
        );
        assert_eq!(db.expire_overdue_suggestions(None, now).unwrap(), 0);
    }

    #[test]
    fn test_suggestion_stats_and_dashboard() {
        let db = Database::in_memory().unwrap();
        let id = user(&db);
        // 2026-05-13 is a Wednesday
        let now = at(2026, 5, 13, 9);
        db.update_profile(
            id,
            &ProfileUpdate {
                spouse_name: Some("Maria".to_string()),
                spouse_birth_date: NaiveDate::from_ymd_opt(1991, 5, 15),
                birth_date: NaiveDate::from_ymd_opt(1990, 8, 1),
                ..Default::default()
            },
            now,
        )
        .unwrap();

        let ids: Vec<i64> = ["um", "dois", "três", "quatro"]
            .iter()
            .map(|c| db.insert_suggestion(id, &draft(c, now), now).unwrap().unwrap())
            .collect();
        db.apply_interaction(id, ids[0], InteractionAction::Accepted, None, None, now)
            .unwrap();
        db.apply_interaction(id, ids[1], InteractionAction::Rejected, None, None, now)
            .unwrap();
        db.apply_interaction(
            id,
            ids[2],
            InteractionAction::Executed,
            None,
            None,
            now + Duration::hours(6),
        )
        .unwrap();

        let stats = db.suggestion_stats(id).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.executed, 1);
        assert!((stats.acceptance_rate - 0.5).abs() < 1e-9);
        assert!((stats.execution_rate - 0.25).abs() < 1e-9);
        assert_eq!(stats.by_type.get("routine"), Some(&4));
        assert!((stats.average_hours_to_action.unwrap() - 6.0).abs() < 0.01);

        db.insert_transaction(&NewTransaction::expense(
            id,
            Decimal::new(2500, 2),
            "gas",
            "Shell",
            at(2026, 5, 2, 10),
        ))
        .unwrap();
        db.insert_transaction(&NewTransaction::expense(
            id,
            Decimal::new(9900, 2),
            "gas",
            "Shell",
            at(2026, 4, 28, 10),
        ))
        .unwrap();

        let dash = db.dashboard_stats(id, now).unwrap();
        assert_eq!(dash.pending_suggestions, 1);
        assert_eq!(dash.suggestions_this_week, 4);
        assert_eq!(dash.transactions_this_month, 1);
        assert_eq!(dash.spent_this_month, Decimal::new(2500, 2));
        assert_eq!(dash.last_activity, Some(now + Duration::hours(6)));
        let next = dash.next_important_date.unwrap();
        assert_eq!(next.date, NaiveDate::from_ymd_opt(2026, 5, 15).unwrap());
        assert_eq!(next.kind, "anniversary");
        assert!(next.description.contains("Maria"));
    }
}
