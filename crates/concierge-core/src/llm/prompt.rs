//! Prompt construction for the suggestion and refinement calls
//!
//! The user context is a Portuguese plain-text document: profile facts,
//! preferences, a digest of recent spending, recently accepted and rejected
//! suggestions, and the current date.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use rust_decimal::Decimal;

use crate::models::{Profile, Suggestion, SuggestionStatus, Transaction};

/// How many categories and descriptions the spending digest lists
const DIGEST_TOP: usize = 5;
/// Accepted/rejected suggestions listed per status
const HISTORY_PER_STATUS: usize = 3;
const HISTORY_EXCERPT_CHARS: usize = 100;

/// Everything the context document is built from
pub struct PromptContext<'a> {
    pub profile: Option<&'a Profile>,
    /// Newest first
    pub transactions: &'a [Transaction],
    /// Oldest first
    pub recent_suggestions: &'a [Suggestion],
    pub now: NaiveDateTime,
}

/// Whole years between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let before_birthday = (today.month(), today.day()) < (birth.month(), birth.day());
    today.year() - birth.year() - i32::from(before_birthday)
}

pub fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Segunda-feira",
        Weekday::Tue => "Terça-feira",
        Weekday::Wed => "Quarta-feira",
        Weekday::Thu => "Quinta-feira",
        Weekday::Fri => "Sexta-feira",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// Render the user context document
pub fn build_context(ctx: &PromptContext<'_>) -> String {
    let today = ctx.now.date();
    let profile = ctx.profile;

    let name = profile
        .and_then(|p| p.name.as_deref())
        .unwrap_or("Não informado");
    let age = profile
        .and_then(|p| p.birth_date)
        .map(|b| age_on(b, today).to_string())
        .unwrap_or_else(|| "Não informada".to_string());
    let spouse = profile
        .and_then(|p| p.spouse_name.as_deref())
        .unwrap_or("Não informado");

    let mut out = format!(
        "Informações do Usuário:\n- Nome: {}\n- Idade: {}\n- Cônjuge: {}",
        name, age, spouse
    );
    if let Some(spouse_birth) = profile.and_then(|p| p.spouse_birth_date) {
        out.push_str(&format!(
            " (aniversário: {})",
            spouse_birth.format("%d/%m")
        ));
    }

    if let Some(profile) = profile {
        let prefs = &profile.preferences;
        out.push_str("\n\nPreferências:");
        if !prefs.categories_of_interest.is_empty() {
            out.push_str(&format!(
                "\n- Categorias de interesse: {}",
                prefs.categories_of_interest.join(", ")
            ));
        }
        let times = prefs.preferred_times.enabled();
        if !times.is_empty() {
            out.push_str(&format!("\n- Horários preferidos: {}", times.join(", ")));
        }
    }

    if !ctx.transactions.is_empty() {
        out.push_str("\n\nPadrões de Transações Recentes:");

        out.push_str("\n- Principais categorias de gasto:");
        for (category, total) in top_categories(ctx.transactions) {
            out.push_str(&format!("\n  • {}: R$ {:.2}", category, total.round_dp(2)));
        }

        let frequent = frequent_descriptions(ctx.transactions);
        if !frequent.is_empty() {
            out.push_str("\n- Estabelecimentos frequentes:");
            for (description, count) in frequent {
                out.push_str(&format!("\n  • {}: {}x", description, count));
            }
        }
    }

    let accepted = last_with_status(ctx.recent_suggestions, SuggestionStatus::Accepted);
    if !accepted.is_empty() {
        out.push_str("\n\nSugestões aceitas recentemente:");
        for s in accepted {
            out.push_str(&format!("\n- {}...", excerpt(&s.content)));
        }
    }
    let rejected = last_with_status(ctx.recent_suggestions, SuggestionStatus::Rejected);
    if !rejected.is_empty() {
        out.push_str("\n\nSugestões rejeitadas recentemente:");
        for s in rejected {
            out.push_str(&format!("\n- {}...", excerpt(&s.content)));
        }
    }

    out.push_str(&format!("\n\nData atual: {}", today.format("%d/%m/%Y")));
    out.push_str(&format!("\nDia da semana: {}", weekday_pt(today.weekday())));
    out
}

/// Context followed by the generation instructions
pub fn suggestions_prompt(context: &str, count: usize) -> String {
    format!(
        r#"{context}

Com base nas informações acima, gere {count} sugestões proativas e personalizadas para ajudar este usuário.

Diretrizes:
1. Seja específico e mencione detalhes do contexto do usuário
2. Varie os tipos de sugestões (economia, lembretes, oportunidades, saúde, relacionamentos)
3. Considere datas importantes, padrões de gasto e preferências
4. Seja útil e prático, com ações claras
5. Use um tom amigável e personalizado
6. Evite sugestões genéricas

Retorne as sugestões em formato JSON com a seguinte estrutura:
{{
  "suggestions": [
    {{
      "type": "anniversary|purchase|routine|seasonal|saving|health",
      "content": "Texto da sugestão personalizada",
      "priority": 1-10,
      "reasoning": "Breve explicação do porquê desta sugestão",
      "category": "categoria relacionada"
    }}
  ]
}}

Gere sugestões criativas e verdadeiramente úteis para o usuário."#
    )
}

pub fn refine_prompt(content: &str, feedback: &str) -> String {
    format!(
        "Sugestão original: {}\n\nFeedback do usuário: {}\n\n\
         Refine a sugestão com base no feedback, mantendo-a útil e personalizada.\n\
         Retorne apenas o texto refinado da sugestão, sem explicações adicionais.",
        content, feedback
    )
}

/// Categories by total amount, descending. Ties keep first-seen order.
fn top_categories(transactions: &[Transaction]) -> Vec<(&str, Decimal)> {
    let mut totals: Vec<(&str, Decimal)> = Vec::new();
    for tx in transactions {
        match totals.iter_mut().find(|(c, _)| *c == tx.category) {
            Some((_, total)) => *total += tx.amount,
            None => totals.push((tx.category.as_str(), tx.amount)),
        }
    }
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals.truncate(DIGEST_TOP);
    totals
}

/// Non-empty descriptions by count, descending. Ties keep first-seen order.
fn frequent_descriptions(transactions: &[Transaction]) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for tx in transactions.iter().filter(|t| !t.description.is_empty()) {
        match counts.iter_mut().find(|(d, _)| *d == tx.description) {
            Some((_, n)) => *n += 1,
            None => counts.push((tx.description.as_str(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(DIGEST_TOP);
    counts
}

fn last_with_status(suggestions: &[Suggestion], status: SuggestionStatus) -> Vec<&Suggestion> {
    let matching: Vec<_> = suggestions.iter().filter(|s| s.status == status).collect();
    let skip = matching.len().saturating_sub(HISTORY_PER_STATUS);
    matching.into_iter().skip(skip).collect()
}

fn excerpt(content: &str) -> String {
    content.chars().take(HISTORY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SuggestionType, TransactionType};
    use chrono::Utc;

    fn tx(category: &str, description: &str, cents: i64) -> Transaction {
        Transaction {
            id: 0,
            user_id: 1,
            amount: Decimal::new(cents, 2),
            transaction_type: TransactionType::Expense,
            category: category.to_string(),
            description: description.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            location: None,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn suggestion(content: &str, status: SuggestionStatus) -> Suggestion {
        Suggestion {
            id: 0,
            user_id: 1,
            suggestion_type: SuggestionType::Routine,
            content: content.to_string(),
            priority: 3,
            status,
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            context_data: None,
            content_hash: String::new(),
            created_at: Utc::now(),
            executed_at: None,
        }
    }

    #[test]
    fn test_age_on() {
        let birth = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 6, 14).unwrap()), 35);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()), 36);
    }

    #[test]
    fn test_context_with_profile_and_spending() {
        let profile = Profile {
            user_id: 1,
            name: Some("João".to_string()),
            birth_date: NaiveDate::from_ymd_opt(1990, 6, 15),
            spouse_name: Some("Maria".to_string()),
            spouse_birth_date: NaiveDate::from_ymd_opt(1991, 5, 15),
            ..Default::default()
        };
        let txs = vec![
            tx("restaurant", "Fasano", 30000),
            tx("gas", "Shell", 20000),
            tx("restaurant", "Fasano", 25000),
        ];
        // 2026-05-10 is a Sunday
        let now = NaiveDate::from_ymd_opt(2026, 5, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let text = build_context(&PromptContext {
            profile: Some(&profile),
            transactions: &txs,
            recent_suggestions: &[],
            now,
        });

        assert!(text.starts_with("Informações do Usuário:\n- Nome: João\n- Idade: 35"));
        assert!(text.contains("- Cônjuge: Maria (aniversário: 15/05)"));
        assert!(text.contains("- Horários preferidos: morning, afternoon, evening, night"));
        assert!(text.contains("  • restaurant: R$ 550.00\n  • gas: R$ 200.00"));
        assert!(text.contains("  • Fasano: 2x"));
        assert!(text.contains("Data atual: 10/05/2026"));
        assert!(text.ends_with("Dia da semana: Domingo"));
    }

    #[test]
    fn test_context_without_profile() {
        let now = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let text = build_context(&PromptContext {
            profile: None,
            transactions: &[],
            recent_suggestions: &[],
            now,
        });
        assert!(text.contains("- Idade: Não informada"));
        assert!(!text.contains("Preferências"));
        assert!(!text.contains("Padrões de Transações"));
    }

    #[test]
    fn test_history_keeps_last_three_truncated() {
        let long = "x".repeat(150);
        let history = vec![
            suggestion("a1", SuggestionStatus::Accepted),
            suggestion("a2", SuggestionStatus::Accepted),
            suggestion("r1", SuggestionStatus::Rejected),
            suggestion("a3", SuggestionStatus::Accepted),
            suggestion(&long, SuggestionStatus::Accepted),
            suggestion("p1", SuggestionStatus::Pending),
        ];
        let now = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let text = build_context(&PromptContext {
            profile: None,
            transactions: &[],
            recent_suggestions: &history,
            now,
        });

        assert!(!text.contains("- a1..."));
        assert!(text.contains("- a2...\n- a3...\n"));
        assert!(text.contains(&format!("- {}...", "x".repeat(100))));
        assert!(!text.contains(&"x".repeat(101)));
        assert!(text.contains("Sugestões rejeitadas recentemente:\n- r1..."));
        assert!(!text.contains("p1"));
    }

    #[test]
    fn test_suggestions_prompt_requests_count() {
        let prompt = suggestions_prompt("CTX", 5);
        assert!(prompt.starts_with("CTX\n\nCom base nas informações acima, gere 5 sugestões"));
        assert!(prompt.contains(r#""suggestions": ["#));
    }

    #[test]
    fn test_refine_prompt() {
        let prompt = refine_prompt("Jantar no Fasano?", "prefiro comida japonesa");
        assert!(prompt.starts_with("Sugestão original: Jantar no Fasano?"));
        assert!(prompt.contains("Feedback do usuário: prefiro comida japonesa"));
    }
}
