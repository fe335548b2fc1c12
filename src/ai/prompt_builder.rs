//! Prompt assembly for itinerary generation.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::facts::AuxiliaryFacts;
use crate::core::config::DEFAULT_LANGUAGE;
use crate::core::models::TripRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// The two messages sent for one generation: system context, then the user request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: [PromptMessage; 2],
}

impl Conversation {
    #[must_use]
    pub fn new(system: String, user: String) -> Self {
        Self {
            messages: [
                PromptMessage {
                    role: Role::System,
                    content: system,
                },
                PromptMessage {
                    role: Role::User,
                    content: user,
                },
            ],
        }
    }

    #[must_use]
    pub const fn messages(&self) -> &[PromptMessage; 2] {
        &self.messages
    }

    #[must_use]
    pub fn system(&self) -> &str {
        &self.messages[0].content
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.messages[1].content
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl PromptBuilder {
    #[must_use]
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Renders the conversation for `request`. Deterministic for equal inputs.
    #[must_use]
    pub fn build(&self, request: &TripRequest, facts: &AuxiliaryFacts) -> Conversation {
        Conversation::new(self.system_message(facts), Self::user_message(request))
    }

    fn system_message(&self, facts: &AuxiliaryFacts) -> String {
        let mut out = String::from("You are a professional travel-planning assistant.\n");

        if facts.weather.is_some() || facts.budget.is_some() {
            out.push_str("\n[Known context]\n");
            if let Some(weather) = &facts.weather {
                let _ = writeln!(out, "- Weather forecast: {weather}");
            }
            if let Some(budget) = &facts.budget {
                let _ = writeln!(out, "- Budget analysis: {budget}");
            }
        }

        let _ = write!(
            out,
            "\nUsing the context above and the traveller's request, design a detailed itinerary.\n\
             You must answer in {}.\n\
             Keep the format easy to read: for every day give Morning, Afternoon and Evening \
             sections with concrete sights and food recommendations.",
            self.language
        );
        out
    }

    fn user_message(request: &TripRequest) -> String {
        let mut out = String::from("Please plan this trip:\n");
        let _ = writeln!(out, "- Destination: {}", request.destination());
        if let (Some(start), Some(end)) = (request.start_date(), request.end_date()) {
            let _ = writeln!(out, "- Dates: {start} to {end}");
        }
        let _ = writeln!(out, "- Days: {}", request.days());
        let _ = writeln!(out, "- Travellers: {}", request.party_size());
        let _ = writeln!(out, "- Total budget: {:.0}", request.budget());
        let _ = writeln!(out, "- Transportation: {}", request.transportation().describe());
        let _ = writeln!(out, "- Preference: {}", request.preference().describe());
        let _ = write!(out, "- Special requests: {}", request.special_request());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ActivityPreference, Transportation};

    fn request() -> TripRequest {
        TripRequest::new("Kyoto", 3, 30000.0, 2, ActivityPreference::Outdoor)
            .unwrap()
            .with_special_request("Want yakiniku; kid-friendly please")
            .with_transportation(Transportation::CharteredCar)
    }

    fn facts() -> AuxiliaryFacts {
        AuxiliaryFacts {
            weather: Some("Cool, 14-20°C".to_string()),
            budget: Some("About 15000 per person".to_string()),
        }
    }

    #[test]
    fn test_conversation_is_system_then_user() {
        let conv = PromptBuilder::default().build(&request(), &facts());
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].role, Role::User);
    }

    #[test]
    fn test_system_message_carries_facts_language_and_format() {
        let conv = PromptBuilder::new("English").build(&request(), &facts());
        let system = conv.system();

        assert!(system.contains("Weather forecast: Cool, 14-20°C"));
        assert!(system.contains("Budget analysis: About 15000 per person"));
        assert!(system.contains("answer in English"));
        assert!(system.contains("Morning, Afternoon and Evening"));
    }

    #[test]
    fn test_system_message_omits_context_block_without_facts() {
        let conv = PromptBuilder::default().build(&request(), &AuxiliaryFacts::default());
        assert!(!conv.system().contains("[Known context]"));
        assert!(conv.system().contains("Traditional Chinese"));
    }

    #[test]
    fn test_user_message_carries_trip_fields_verbatim() {
        let conv = PromptBuilder::default().build(&request(), &facts());
        let user = conv.user();

        assert!(user.contains("Destination: Kyoto"));
        assert!(user.contains("Days: 3"));
        assert!(user.contains("Travellers: 2"));
        assert!(user.contains("Total budget: 30000"));
        assert!(user.contains("outdoor nature and adventure"));
        assert!(user.contains("chartered car with driver"));
        assert!(user.ends_with("Special requests: Want yakiniku; kid-friendly please"));
    }

    #[test]
    fn test_serializes_as_role_tagged_array() {
        let conv = PromptBuilder::default().build(&request(), &facts());
        let json = serde_json::to_value(&conv).unwrap();

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json.as_array().unwrap().len(), 2);
    }
}
