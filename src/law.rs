//! Law metadata and the name catalogue used to resolve law-name citations.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::LawId;

/// Kind of legal instrument a law record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LawType {
    Act,
    CabinetOrder,
    ImperialOrdinance,
    Ordinance,
    Rule,
    Other,
}

#[allow(clippy::should_implement_trait)]
impl LawType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LawType::Act => "Act",
            LawType::CabinetOrder => "CabinetOrder",
            LawType::ImperialOrdinance => "ImperialOrdinance",
            LawType::Ordinance => "Ordinance",
            LawType::Rule => "Rule",
            LawType::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Option<LawType> {
        match s {
            "Act" => Some(LawType::Act),
            "CabinetOrder" => Some(LawType::CabinetOrder),
            "ImperialOrdinance" => Some(LawType::ImperialOrdinance),
            "Ordinance" => Some(LawType::Ordinance),
            "Rule" => Some(LawType::Rule),
            "Other" => Some(LawType::Other),
            _ => None,
        }
    }

    /// Maps the 2-letter type code embedded in a law id.
    pub fn from_code(code: &str) -> LawType {
        match code {
            "AC" => LawType::Act,
            "CO" => LawType::CabinetOrder,
            "IO" => LawType::ImperialOrdinance,
            _ => LawType::Other,
        }
    }
}

/// Japanese imperial era used in law numbers and promulgation dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Era {
    Meiji,
    Taisho,
    Showa,
    Heisei,
    Reiwa,
}

impl Era {
    /// Parses either the romanised name (`"Showa"`) or the kanji name (`"昭和"`).
    pub fn parse(s: &str) -> Option<Era> {
        match s {
            "Meiji" | "明治" => Some(Era::Meiji),
            "Taisho" | "大正" => Some(Era::Taisho),
            "Showa" | "昭和" => Some(Era::Showa),
            "Heisei" | "平成" => Some(Era::Heisei),
            "Reiwa" | "令和" => Some(Era::Reiwa),
            _ => None,
        }
    }

    pub fn kanji(&self) -> &'static str {
        match self {
            Era::Meiji => "明治",
            Era::Taisho => "大正",
            Era::Showa => "昭和",
            Era::Heisei => "平成",
            Era::Reiwa => "令和",
        }
    }

    /// First Gregorian year of the era.
    pub fn start_year(&self) -> i32 {
        match self {
            Era::Meiji => 1868,
            Era::Taisho => 1912,
            Era::Showa => 1926,
            Era::Heisei => 1989,
            Era::Reiwa => 2019,
        }
    }

    /// Converts an era year (1-based, "元年" is 1) to a Gregorian year.
    /// Years that do not fit an `i32` give `None`.
    pub fn to_gregorian_year(&self, year: u32) -> Option<i32> {
        i32::try_from(year)
            .ok()
            .and_then(|year| self.start_year().checked_add(year))
            .map(|year| year - 1)
    }
}

/// A law record as supplied by the law repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Law {
    pub law_id: LawId,
    pub law_type: LawType,
    /// Official number, e.g. `明治二十九年法律第八十九号`.
    pub law_num: String,
    pub title: String,
    pub title_kana: Option<String>,
    pub abbreviation: Option<String>,
    pub era: Era,
    pub year: u32,
    pub num: u32,
    pub promulgate_date: Option<NaiveDate>,
}

impl Law {
    /// Builds a minimal record, deriving the type from the id's type code.
    pub fn new(law_id: LawId, title: &str, era: Era, year: u32, num: u32) -> Self {
        let law_type = LawType::from_code(law_id.type_code());
        Self {
            law_id,
            law_type,
            law_num: String::new(),
            title: title.to_string(),
            title_kana: None,
            abbreviation: None,
            era,
            year,
            num,
            promulgate_date: None,
        }
    }

    pub fn with_abbreviation(mut self, abbreviation: &str) -> Self {
        self.abbreviation = Some(abbreviation.to_string());
        self
    }

    pub fn with_law_num(mut self, law_num: &str) -> Self {
        self.law_num = law_num.to_string();
        self
    }

    /// Gregorian year of promulgation.
    pub fn gregorian_year(&self) -> Option<i32> {
        self.era.to_gregorian_year(self.year)
    }
}

/// In-memory index from law titles, abbreviations and law numbers to ids.
#[derive(Debug, Clone, Default)]
pub struct LawCatalogue {
    by_name: HashMap<String, LawId>,
}

impl LawCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every title, abbreviation and law number of `laws`.
    pub fn from_laws<'a>(laws: impl IntoIterator<Item = &'a Law>) -> Self {
        let mut catalogue = Self::new();
        for law in laws {
            catalogue.insert(law);
        }
        catalogue
    }

    pub fn insert(&mut self, law: &Law) {
        self.by_name.insert(law.title.clone(), law.law_id.clone());
        if let Some(abbrev) = law.abbreviation.as_deref().filter(|a| !a.is_empty()) {
            self.by_name.insert(abbrev.to_string(), law.law_id.clone());
        }
        if !law.law_num.is_empty() {
            self.by_name.insert(law.law_num.clone(), law.law_id.clone());
        }
    }

    /// Exact lookup of a title, abbreviation or law number.
    pub fn lookup(&self, name: &str) -> Option<&LawId> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
