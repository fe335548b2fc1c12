use chrono::NaiveDate;
use tripplanner::ai::{AuxiliaryFacts, PromptBuilder, Role};
use tripplanner::core::models::{ActivityPreference, Transportation, TripRequest};

fn sample_requests() -> Vec<TripRequest> {
    vec![
        TripRequest::new("Taipei", 1, 0.0, 1, ActivityPreference::Indoor).unwrap(),
        TripRequest::new("Paris", 5, 120000.0, 4, ActivityPreference::Outdoor)
            .unwrap()
            .with_special_request("想吃燒肉、要有親子設施")
            .with_transportation(Transportation::RentalCar),
        TripRequest::new("Seoul", 1, 45000.5, 3, ActivityPreference::Indoor)
            .unwrap()
            .with_dates(
                NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(),
            )
            .unwrap(),
    ]
}

#[test]
fn test_prompt_is_deterministic() {
    let builder = PromptBuilder::default();
    let facts = AuxiliaryFacts {
        weather: Some("Sunny".to_string()),
        budget: Some("Plenty".to_string()),
    };

    for request in sample_requests() {
        let first = builder.build(&request, &facts);
        let second = builder.build(&request.clone(), &facts.clone());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_prompt_always_has_two_messages() {
    let builder = PromptBuilder::new("English");
    for request in sample_requests() {
        let conversation = builder.build(&request, &AuxiliaryFacts::default());
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }
}

#[test]
fn test_special_request_is_verbatim() {
    let requests = sample_requests();
    let conversation = PromptBuilder::default().build(&requests[1], &AuxiliaryFacts::default());
    assert!(conversation.user().contains("想吃燒肉、要有親子設施"));
}

#[test]
fn test_dates_appear_when_given() {
    let requests = sample_requests();
    let conversation = PromptBuilder::default().build(&requests[2], &AuxiliaryFacts::default());
    assert!(conversation.user().contains("Dates: 2026-01-10 to 2026-01-14"));
    assert!(conversation.user().contains("Days: 5"));
}
