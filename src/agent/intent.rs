//! Rule-based intent resolution
//!
//! Maps a raw utterance to a structured [`Action`]. Rules are tried in a
//! fixed priority order and the first match wins:
//!
//! 1. a bare number of three or more digits is a student number lookup
//! 2. "check" / "tuition" / "status" asks for the student number
//! 3. "pay" tries to extract student, amount and term
//! 4. exactly "yes" / "confirm" confirms the last quoted balance
//! 5. "address ..." / "find address ..." searches the address book
//!
//! Anything else is left to the language model.
//!
//! Extraction is best-effort. With several dollar amounts in one message the
//! first one wins, even if it was not meant as the payment amount. Terms
//! must stand as whole words: "xFall2024" and "Fall 20245" are not terms.

use crate::services::{PaymentRequest, StudentTuition};
use crate::session::{ConversationTurn, MessageType, Role};
use regex::{Match, Regex};
use rust_decimal::Decimal;
use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

const MIN_STUDENT_NO_DIGITS: usize = 3;
const LOOKUP_KEYWORDS: [&str; 3] = ["check", "tuition", "status"];
const PAY_KEYWORD: &str = "pay";
const CONFIRM_WORDS: [&str; 2] = ["yes", "confirm"];

static STUDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)student\s*(\d+)").expect("valid student regex"));

static TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(fall|spring)\s*(\d{4})\b").expect("valid term regex")
});

static DOLLAR_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("valid dollar amount regex")
});

static BARE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid number regex"));

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:find|search)\s+)?address(?:es)?\b[\s:]*(?:for\s+)?(.*)$")
        .expect("valid address regex")
});

/// Reply-only intents: change the prompt, call nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Lookup intent without a student number
    AskStudentNumber,
    /// Payment intent without enough detail to pay
    CheckTuitionFirst,
}

impl Prompt {
    pub fn text(self) -> &'static str {
        match self {
            Prompt::AskStudentNumber => {
                "Sure, I can help with that. Please provide your student number."
            }
            Prompt::CheckTuitionFirst => {
                "Okay, I can assist you with that. Please check your tuition first to see the amount due."
            }
        }
    }
}

/// Resolved intent of one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing structured; answer with the language model
    None,
    Prompt(Prompt),
    FetchTuition { student_no: String },
    PayTuition(PaymentRequest),
    /// Pay the balance last shown to the user, see [`resolve_pending_payment`]
    ConfirmPendingPayment,
    ListAddresses,
    SearchAddresses { query: String },
}

/// Result of pulling payment arguments out of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentExtraction {
    /// Student, amount and term all present
    Matched(PaymentRequest),
    /// Payment intent, but at least one argument missing
    Incomplete,
    /// Not a payment request
    NoMatch,
}

/// Classify an utterance. History is only needed later, to resolve
/// [`Action::ConfirmPendingPayment`].
pub fn resolve(utterance: &str) -> Action {
    let trimmed = utterance.trim();
    let lower = utterance.to_lowercase();

    if is_student_number(trimmed) {
        return Action::FetchTuition {
            student_no: trimmed.to_string(),
        };
    }

    if LOOKUP_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Action::Prompt(Prompt::AskStudentNumber);
    }

    match extract_payment(utterance) {
        PaymentExtraction::Matched(payment) => return Action::PayTuition(payment),
        PaymentExtraction::Incomplete => return Action::Prompt(Prompt::CheckTuitionFirst),
        PaymentExtraction::NoMatch => {}
    }

    let lower_trimmed = lower.trim();
    if CONFIRM_WORDS.contains(&lower_trimmed) {
        return Action::ConfirmPendingPayment;
    }

    if let Some(action) = address_lookup(trimmed) {
        return action;
    }

    Action::None
}

/// `^\d{3,}$`
pub fn is_student_number(s: &str) -> bool {
    s.len() >= MIN_STUDENT_NO_DIGITS && s.bytes().all(|b| b.is_ascii_digit())
}

/// Pull `{student, amount, term}` out of a payment request.
///
/// The amount is the first `$`-prefixed number; failing that, the first
/// number that is neither the student number nor the term year.
pub fn extract_payment(utterance: &str) -> PaymentExtraction {
    if !utterance.to_lowercase().contains(PAY_KEYWORD) {
        return PaymentExtraction::NoMatch;
    }

    let student = STUDENT_RE.captures(utterance).and_then(|c| c.get(1));
    let term = TERM_RE.captures(utterance);

    let reserved: Vec<Range<usize>> = student
        .iter()
        .map(Match::range)
        .chain(term.iter().filter_map(|c| c.get(2)).map(|m| m.range()))
        .collect();

    let amount = extract_amount(utterance, &reserved);
    let term = term.and_then(|c| Some(compact_term(c.get(1)?.as_str(), c.get(2)?.as_str())));

    match (student, amount, term) {
        (Some(student), Some(amount), Some(term)) => {
            PaymentExtraction::Matched(PaymentRequest::new(student.as_str(), amount, &term))
        }
        _ => PaymentExtraction::Incomplete,
    }
}

fn extract_amount(utterance: &str, reserved: &[Range<usize>]) -> Option<Decimal> {
    let dollar = DOLLAR_AMOUNT_RE
        .captures(utterance)
        .and_then(|c| c.get(1));

    let token = dollar.or_else(|| {
        BARE_NUMBER_RE
            .find_iter(utterance)
            .find(|m| !reserved.iter().any(|r| overlaps(r, &m.range())))
    })?;

    parse_amount(token.as_str())
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// "1,250.50" -> 1250.50
fn parse_amount(token: &str) -> Option<Decimal> {
    let digits: String = token.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&digits).ok()
}

/// "fall", "2024" -> "Fall2024"
fn compact_term(season: &str, year: &str) -> String {
    let season = if season.eq_ignore_ascii_case("fall") {
        "Fall"
    } else {
        "Spring"
    };
    format!("{season}{year}")
}

fn address_lookup(trimmed: &str) -> Option<Action> {
    let captures = ADDRESS_RE.captures(trimmed)?;
    let query = captures.get(1).map_or("", |m| m.as_str().trim());
    if query.is_empty() {
        Some(Action::ListAddresses)
    } else {
        Some(Action::SearchAddresses {
            query: query.to_string(),
        })
    }
}

/// Recover the payment the user is confirming.
///
/// Walks the history newest-first and takes the first tuition card whose
/// displayed term has an outstanding balance. Only `tuition_card` turns are
/// quotes; receipts and other payloads are ignored. Returns `None` when
/// nothing was quoted, in which case no payment is made.
pub fn resolve_pending_payment(history: &[ConversationTurn]) -> Option<PaymentRequest> {
    history
        .iter()
        .rev()
        .filter(|turn| {
            turn.role == Role::Assistant && turn.message_type == MessageType::TuitionCard
        })
        .filter_map(|turn| turn.metadata.as_ref())
        .filter_map(|metadata| serde_json::from_value::<StudentTuition>(metadata.clone()).ok())
        .find_map(|tuition| {
            let record = tuition.outstanding()?;
            Some(PaymentRequest::new(
                tuition.student_no.as_str(),
                record.balance,
                &record.term,
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pay(student_no: &str, amount: i64, term: &str) -> Action {
        Action::PayTuition(PaymentRequest::new(student_no, Decimal::from(amount), term))
    }

    fn tuition_card(metadata: serde_json::Value) -> ConversationTurn {
        ConversationTurn::assistant(
            "Here is the tuition information:",
            MessageType::TuitionCard,
            Some(metadata),
        )
    }

    #[test]
    fn test_student_number_lookup() {
        assert_eq!(
            resolve("12345"),
            Action::FetchTuition {
                student_no: "12345".to_string()
            }
        );
        assert_eq!(
            resolve("  987  "),
            Action::FetchTuition {
                student_no: "987".to_string()
            }
        );
    }

    #[test]
    fn test_short_numbers_are_chat() {
        assert_eq!(resolve("42"), Action::None);
        assert_eq!(resolve("7"), Action::None);
    }

    #[test]
    fn test_lookup_keywords_ask_for_student_number() {
        for utterance in ["Check my balance", "TUITION please", "what's my status?"] {
            assert_eq!(
                resolve(utterance),
                Action::Prompt(Prompt::AskStudentNumber),
                "{utterance}"
            );
        }
    }

    #[test]
    fn test_lookup_keywords_win_over_pay() {
        // Rule order: "tuition" is checked before "pay"
        assert_eq!(
            resolve("pay my tuition"),
            Action::Prompt(Prompt::AskStudentNumber)
        );
    }

    #[test]
    fn test_full_payment_request() {
        assert_eq!(
            resolve("pay student 12345 $500 Fall 2024"),
            pay("12345", 500, "Fall2024")
        );
    }

    #[test]
    fn test_payment_amount_with_commas_and_cents() {
        let PaymentExtraction::Matched(payment) =
            extract_payment("Pay $1,250.50 for student 777 spring2025")
        else {
            panic!("expected a match");
        };
        assert_eq!(payment.student_no, "777");
        assert_eq!(payment.amount, Decimal::from_str("1250.50").unwrap());
        assert_eq!(payment.term(), "Spring2025");
    }

    #[test]
    fn test_payment_amount_without_dollar_sign() {
        assert_eq!(
            resolve("pay 500 for student 12345 Fall 2024"),
            pay("12345", 500, "Fall2024")
        );
        assert_eq!(
            resolve("pay student 12345 Fall 2024 amount 300"),
            pay("12345", 300, "Fall2024")
        );
    }

    #[test]
    fn test_first_dollar_amount_wins() {
        assert_eq!(
            resolve("pay student 12345 $200 of the $500 Fall 2024"),
            pay("12345", 200, "Fall2024")
        );
    }

    #[test]
    fn test_incomplete_payment_asks_to_check_first() {
        assert_eq!(
            resolve("I want to pay"),
            Action::Prompt(Prompt::CheckTuitionFirst)
        );
        assert_eq!(
            extract_payment("pay student 12345 $500"),
            PaymentExtraction::Incomplete
        );
        assert_eq!(
            extract_payment("pay $500 Fall 2024"),
            PaymentExtraction::Incomplete
        );
        assert_eq!(
            extract_payment("pay student 12345 Fall 2024"),
            PaymentExtraction::Incomplete
        );
    }

    #[test]
    fn test_no_pay_keyword_is_no_match() {
        assert_eq!(
            extract_payment("student 12345 $500 Fall 2024"),
            PaymentExtraction::NoMatch
        );
    }

    #[test]
    fn test_confirmation_words() {
        assert_eq!(resolve("yes"), Action::ConfirmPendingPayment);
        assert_eq!(resolve("  YES "), Action::ConfirmPendingPayment);
        assert_eq!(resolve("Confirm"), Action::ConfirmPendingPayment);
        assert_eq!(resolve("yes please"), Action::None);
    }

    #[test]
    fn test_address_lookup() {
        assert_eq!(resolve("address"), Action::ListAddresses);
        assert_eq!(resolve("addresses"), Action::ListAddresses);
        assert_eq!(
            resolve("find address for Registrar"),
            Action::SearchAddresses {
                query: "Registrar".to_string()
            }
        );
        assert_eq!(
            resolve("Address: library"),
            Action::SearchAddresses {
                query: "library".to_string()
            }
        );
        assert_eq!(resolve("addressing the crowd"), Action::None);
    }

    #[test]
    fn test_small_talk_goes_to_model() {
        assert_eq!(resolve("hello there"), Action::None);
        assert_eq!(resolve(""), Action::None);
    }

    #[test]
    fn test_pending_payment_from_history() {
        let history = vec![
            ConversationTurn::user("12345"),
            tuition_card(json!({
                "student_no": "12345",
                "tuitions": [{ "term": "Fall2024", "balance": 500 }]
            })),
        ];

        let payment = resolve_pending_payment(&history).unwrap();
        assert_eq!(payment, PaymentRequest::new("12345", Decimal::from(500), "Fall2024"));
    }

    #[test]
    fn test_pending_payment_ignores_settled_balance() {
        let history = vec![tuition_card(json!({
            "student_no": "12345",
            "tuitions": [{ "term": "Fall2024", "balance": 0 }]
        }))];

        assert_eq!(resolve_pending_payment(&history), None);
    }

    #[test]
    fn test_pending_payment_without_quote() {
        let history = vec![
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("Hi! How can I help?", MessageType::Text, None),
        ];
        assert_eq!(resolve_pending_payment(&history), None);
        assert_eq!(resolve_pending_payment(&[]), None);
    }

    #[test]
    fn test_pending_payment_prefers_most_recent_quote() {
        let history = vec![
            tuition_card(json!({
                "student_no": "111",
                "tuitions": [{ "term": "Spring2024", "balance": 100 }]
            })),
            tuition_card(json!({
                "student_no": "222",
                "tuitions": [{ "term": "Fall 2024", "balance": 750 }]
            })),
            ConversationTurn::assistant("Anything else?", MessageType::Text, None),
        ];

        let payment = resolve_pending_payment(&history).unwrap();
        assert_eq!(payment.student_no, "222");
        assert_eq!(payment.amount, Decimal::from(750));
        assert_eq!(payment.term(), "Fall2024");
    }

    #[test]
    fn test_pending_payment_skips_settled_quote_for_older_one() {
        let history = vec![
            tuition_card(json!({
                "student_no": "111",
                "tuitions": [{ "term": "Spring2024", "balance": 100 }]
            })),
            tuition_card(json!({
                "student_no": "222",
                "tuitions": [{ "term": "Fall2024", "balance": 0 }]
            })),
        ];

        let payment = resolve_pending_payment(&history).unwrap();
        assert_eq!(payment.student_no, "111");
    }

    #[test]
    fn test_payment_receipt_is_not_a_quote() {
        let receipt = ConversationTurn::assistant(
            "Payment successful.",
            MessageType::PaymentSuccess,
            Some(json!({ "student_no": "12345", "term": "Fall2024", "amount": 500 })),
        );
        assert_eq!(resolve_pending_payment(&[receipt]), None);
    }

    #[test]
    fn test_receipt_after_card_still_finds_card() {
        let history = vec![
            tuition_card(json!({
                "student_no": "12345",
                "tuitions": [{ "term": "Fall2024", "balance": 500 }]
            })),
            ConversationTurn::assistant(
                "Payment successful.",
                MessageType::PaymentSuccess,
                Some(json!({ "student_no": "12345", "term": "Fall2024", "amount": 200 })),
            ),
        ];
        let payment = resolve_pending_payment(&history).unwrap();
        assert_eq!(payment.amount, Decimal::from(500));
    }

    #[test]
    fn test_quote_without_term_is_ignored() {
        let history = vec![tuition_card(json!({ "student_no": "12345", "balance": 300 }))];
        assert_eq!(resolve_pending_payment(&history), None);
    }

    #[test]
    fn test_only_displayed_term_is_payable() {
        let history = vec![tuition_card(json!({
            "student_no": "12345",
            "tuitions": [
                { "term": "Fall2024", "balance": 0 },
                { "term": "Spring2025", "balance": 300 }
            ]
        }))];
        assert_eq!(resolve_pending_payment(&history), None);
    }

    #[test]
    fn test_term_must_be_a_whole_word() {
        assert_eq!(
            extract_payment("pay student 12345 $500 xFall2024"),
            PaymentExtraction::Incomplete
        );
        assert_eq!(
            extract_payment("pay student 12345 $500 Fall 20245"),
            PaymentExtraction::Incomplete
        );
    }

    #[test]
    fn test_pending_payment_ignores_user_metadata() {
        let mut turn = ConversationTurn::user("yes");
        turn.metadata = Some(json!({
            "student_no": "12345",
            "tuitions": [{ "term": "Fall2024", "balance": 500 }]
        }));
        assert_eq!(resolve_pending_payment(&[turn]), None);
    }
}
