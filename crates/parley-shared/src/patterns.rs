//! Static industry / event / recipient pattern tables.
//!
//! Every table is an exhaustive match with an `Unknown` fallback, so adding a
//! variant is a compile error until each lookup handles it. Keyword detection
//! is deterministic and is used when the auxiliary context analysis is
//! unavailable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Industry {
    Technology,
    Healthcare,
    Finance,
    Education,
    Retail,
    Hospitality,
    Manufacturing,
    Nonprofit,
    RealEstate,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Conference,
    TradeShow,
    EmployeeAppreciation,
    ClientAppreciation,
    Onboarding,
    ProductLaunch,
    Holiday,
    Fundraiser,
    TeamBuilding,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    Employees,
    Clients,
    Prospects,
    Attendees,
    Executives,
    Volunteers,
    Students,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Expected quality tier for a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Economy,
    Standard,
    Premium,
}

/// Typical per-item spend for a context
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternProfile {
    pub quality_expectations: QualityTier,
    pub budget_range: BudgetRange,
    pub preferred_products: Vec<String>,
    pub common_uses: Vec<String>,
}

fn contains_any(s: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| s.contains(t))
}

impl Industry {
    /// Keyword heuristics over the raw request text
    pub fn detect(text: &str) -> Self {
        let t = text.to_lowercase();
        let tech = ["software", "tech", "saas", "startup", "developer", "engineering team"];
        let health = ["hospital", "clinic", "nurse", "medical", "healthcare", "pharma"];
        if contains_any(&t, &tech) {
            Self::Technology
        } else if contains_any(&t, &health) {
            Self::Healthcare
        } else if contains_any(&t, &["bank", "finance", "insurance", "accounting", "investment"]) {
            Self::Finance
        } else if contains_any(&t, &["school", "university", "college", "teacher", "campus"]) {
            Self::Education
        } else if contains_any(&t, &["store", "retail", "shop", "boutique"]) {
            Self::Retail
        } else if contains_any(&t, &["hotel", "restaurant", "hospitality", "resort"]) {
            Self::Hospitality
        } else if contains_any(&t, &["factory", "manufactur", "plant", "warehouse"]) {
            Self::Manufacturing
        } else if contains_any(&t, &["nonprofit", "non-profit", "charity", "foundation"]) {
            Self::Nonprofit
        } else if contains_any(&t, &["real estate", "realtor", "brokerage", "property"]) {
            Self::RealEstate
        } else {
            Self::Unknown
        }
    }
}

impl EventType {
    pub fn detect(text: &str) -> Self {
        let t = text.to_lowercase();
        if contains_any(&t, &["trade show", "tradeshow", "expo", "booth"]) {
            Self::TradeShow
        } else if contains_any(&t, &["conference", "summit", "convention"]) {
            Self::Conference
        } else if contains_any(&t, &["onboarding", "new hire", "welcome kit"]) {
            Self::Onboarding
        } else if contains_any(&t, &["appreciation", "thank you", "thank-you"]) {
            if contains_any(&t, &["client", "customer"]) {
                Self::ClientAppreciation
            } else {
                Self::EmployeeAppreciation
            }
        } else if contains_any(&t, &["launch", "release party"]) {
            Self::ProductLaunch
        } else if contains_any(&t, &["holiday", "christmas", "year-end", "new year"]) {
            Self::Holiday
        } else if contains_any(&t, &["fundraiser", "gala", "donor"]) {
            Self::Fundraiser
        } else if contains_any(&t, &["team building", "offsite", "retreat"]) {
            Self::TeamBuilding
        } else {
            Self::Unknown
        }
    }
}

impl RecipientType {
    pub fn detect(text: &str) -> Self {
        let t = text.to_lowercase();
        if contains_any(&t, &["executive", "board member", "c-suite", "vip"]) {
            Self::Executives
        } else if contains_any(&t, &["employee", "staff", "team", "coworker"]) {
            Self::Employees
        } else if contains_any(&t, &["client", "customer"]) {
            Self::Clients
        } else if contains_any(&t, &["prospect", "lead"]) {
            Self::Prospects
        } else if contains_any(&t, &["attendee", "visitor", "guest"]) {
            Self::Attendees
        } else if contains_any(&t, &["volunteer"]) {
            Self::Volunteers
        } else if contains_any(&t, &["student"]) {
            Self::Students
        } else {
            Self::Unknown
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl PatternProfile {
    /// Profile for an industry / event pair.
    ///
    /// Products come from the industry; quality, spend and uses from the event.
    pub fn lookup(industry: Industry, event: EventType) -> Self {
        let preferred_products = match industry {
            Industry::Technology => {
                strings(&["tech accessories", "insulated drinkware", "backpacks"])
            }
            Industry::Healthcare => strings(&["wellness kits", "lanyards", "hand sanitizer"]),
            Industry::Finance => {
                strings(&["leather portfolios", "premium pens", "desk accessories"])
            }
            Industry::Education => strings(&["notebooks", "tote bags", "water bottles"]),
            Industry::Retail => strings(&["shopping totes", "gift cards", "keychains"]),
            Industry::Hospitality => strings(&["branded linens", "drinkware", "amenity kits"]),
            Industry::Manufacturing => strings(&["safety gear", "work apparel", "tool kits"]),
            Industry::Nonprofit => strings(&["t-shirts", "reusable bags", "stickers"]),
            Industry::RealEstate => strings(&["closing gifts", "home goods", "calendars"]),
            Industry::Unknown => strings(&["apparel", "drinkware", "bags"]),
        };

        let (quality_expectations, budget_range, common_uses) = match event {
            EventType::Conference => (
                QualityTier::Standard,
                BudgetRange { min: 3.0, max: 15.0 },
                strings(&["attendee swag", "speaker gifts"]),
            ),
            EventType::TradeShow => (
                QualityTier::Economy,
                BudgetRange { min: 1.0, max: 8.0 },
                strings(&["booth giveaways", "lead capture incentives"]),
            ),
            EventType::EmployeeAppreciation => (
                QualityTier::Premium,
                BudgetRange { min: 25.0, max: 100.0 },
                strings(&["recognition gifts", "milestone awards"]),
            ),
            EventType::ClientAppreciation => (
                QualityTier::Premium,
                BudgetRange { min: 40.0, max: 150.0 },
                strings(&["thank-you gifts", "relationship building"]),
            ),
            EventType::Onboarding => (
                QualityTier::Standard,
                BudgetRange { min: 30.0, max: 120.0 },
                strings(&["welcome kits", "first-day essentials"]),
            ),
            EventType::ProductLaunch => (
                QualityTier::Standard,
                BudgetRange { min: 10.0, max: 50.0 },
                strings(&["launch kits", "press mailers"]),
            ),
            EventType::Holiday => (
                QualityTier::Premium,
                BudgetRange { min: 20.0, max: 80.0 },
                strings(&["seasonal gifts", "year-end thank-yous"]),
            ),
            EventType::Fundraiser => (
                QualityTier::Economy,
                BudgetRange { min: 2.0, max: 20.0 },
                strings(&["donor thank-yous", "merchandise sales"]),
            ),
            EventType::TeamBuilding => (
                QualityTier::Standard,
                BudgetRange { min: 15.0, max: 60.0 },
                strings(&["team apparel", "activity kits"]),
            ),
            EventType::Unknown => (
                QualityTier::Standard,
                BudgetRange { min: 5.0, max: 50.0 },
                strings(&["general promotion"]),
            ),
        };

        Self {
            quality_expectations,
            budget_range,
            preferred_products,
            common_uses,
        }
    }
}
