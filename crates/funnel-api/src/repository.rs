//! Catalog repository: states, benefits and candidates
//!
//! [`InMemoryCatalog`] keeps everything behind one lock so the duplicate
//! email check and the insert happen atomically.

use crate::error::RepositoryError;
use chrono::Utc;
use funnel_core::{Benefit, Candidate, NewBenefit, NewCandidate, NewState, ReferenceState};
use parking_lot::RwLock;
use std::fmt;

/// The 27 federative units with their seeded vacancy counts
const SEED_STATES: [(&str, &str, u32); 27] = [
    ("AC", "Acre", 0),
    ("AL", "Alagoas", 0),
    ("AP", "Amapá", 0),
    ("AM", "Amazonas", 0),
    ("BA", "Bahia", 9),
    ("CE", "Ceará", 0),
    ("DF", "Distrito Federal", 0),
    ("ES", "Espírito Santo", 0),
    ("GO", "Goiás", 0),
    ("MA", "Maranhão", 0),
    ("MT", "Mato Grosso", 0),
    ("MS", "Mato Grosso do Sul", 0),
    ("MG", "Minas Gerais", 12),
    ("PA", "Pará", 0),
    ("PB", "Paraíba", 0),
    ("PR", "Paraná", 8),
    ("PE", "Pernambuco", 0),
    ("PI", "Piauí", 0),
    ("RJ", "Rio de Janeiro", 18),
    ("RN", "Rio Grande do Norte", 0),
    ("RS", "Rio Grande do Sul", 0),
    ("RO", "Rondônia", 0),
    ("RR", "Roraima", 0),
    ("SC", "Santa Catarina", 0),
    ("SP", "São Paulo", 26),
    ("SE", "Sergipe", 0),
    ("TO", "Tocantins", 0),
];

const SEED_BENEFITS: [(&str, &str, &str); 4] = [
    ("Horário Flexível", "Faça entregas no seu próprio horário", "clock"),
    ("Ganhos Semanais", "Receba seus pagamentos toda semana", "wallet"),
    ("Suporte 24/7", "Atendimento e suporte completo", "headset"),
    ("Seguro", "Proteção durante suas entregas", "shield"),
];

/// Storage behind the API handlers
pub trait CatalogRepository: Send + Sync + fmt::Debug {
    /// Every state, in insertion order
    fn states(&self) -> Vec<ReferenceState>;

    /// State by two-letter code
    fn state(&self, code: &str) -> Option<ReferenceState>;

    /// Add a state
    ///
    /// # Errors
    /// `Invalid` for a malformed or duplicate code
    fn create_state(&self, new: NewState) -> Result<ReferenceState, RepositoryError>;

    /// Every benefit
    fn benefits(&self) -> Vec<Benefit>;

    /// Add a benefit
    ///
    /// # Errors
    /// `Invalid` when title or description is blank
    fn create_benefit(&self, new: NewBenefit) -> Result<Benefit, RepositoryError>;

    /// Every candidate
    fn candidates(&self) -> Vec<Candidate>;

    /// Add a candidate
    ///
    /// # Errors
    /// `Invalid` on a column constraint, `DuplicateEmail` when the email is
    /// taken, `UnknownState` when the state code is not in the catalog
    fn create_candidate(&self, new: NewCandidate) -> Result<Candidate, RepositoryError>;

    /// States currently recruiting
    fn states_with_vacancies(&self) -> Vec<ReferenceState> {
        self.states().into_iter().filter(|s| s.has_vacancies).collect()
    }
}

#[derive(Debug, Default)]
struct Tables {
    states: Vec<ReferenceState>,
    benefits: Vec<Benefit>,
    candidates: Vec<Candidate>,
}

impl Tables {
    fn next_id(len: usize) -> u64 {
        u64::try_from(len).map_or(u64::MAX, |n| n + 1)
    }
}

/// Lock-guarded in-memory tables
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
}

impl InMemoryCatalog {
    /// Create empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the federative units and landing-page benefits
    #[must_use]
    pub fn seeded() -> Self {
        let catalog = Self::new();
        {
            let mut tables = catalog.tables.write();
            for (code, name, vacancies) in SEED_STATES {
                let id = Tables::next_id(tables.states.len());
                tables.states.push(ReferenceState {
                    id,
                    code: code.to_string(),
                    name: name.to_string(),
                    has_vacancies: vacancies > 0,
                    vacancy_count: vacancies,
                });
            }
            for (title, description, icon) in SEED_BENEFITS {
                let id = Tables::next_id(tables.benefits.len());
                tables.benefits.push(Benefit {
                    id,
                    title: title.to_string(),
                    description: description.to_string(),
                    icon_name: icon.to_string(),
                });
            }
        }
        catalog
    }
}

impl CatalogRepository for InMemoryCatalog {
    fn states(&self) -> Vec<ReferenceState> {
        self.tables.read().states.clone()
    }

    fn state(&self, code: &str) -> Option<ReferenceState> {
        let code = code.trim().to_uppercase();
        self.tables.read().states.iter().find(|s| s.code == code).cloned()
    }

    fn create_state(&self, new: NewState) -> Result<ReferenceState, RepositoryError> {
        let code = new.code.trim().to_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RepositoryError::Invalid("state code must be two letters".to_string()));
        }
        if new.name.trim().is_empty() {
            return Err(RepositoryError::Invalid("state name is required".to_string()));
        }

        let mut tables = self.tables.write();
        if tables.states.iter().any(|s| s.code == code) {
            return Err(RepositoryError::Invalid(format!("state {code} already exists")));
        }
        let state = ReferenceState {
            id: Tables::next_id(tables.states.len()),
            code,
            name: new.name,
            has_vacancies: new.has_vacancies,
            vacancy_count: new.vacancy_count,
        };
        tables.states.push(state.clone());
        Ok(state)
    }

    fn benefits(&self) -> Vec<Benefit> {
        self.tables.read().benefits.clone()
    }

    fn create_benefit(&self, new: NewBenefit) -> Result<Benefit, RepositoryError> {
        if new.title.trim().is_empty() || new.description.trim().is_empty() {
            return Err(RepositoryError::Invalid("title and description are required".to_string()));
        }
        let mut tables = self.tables.write();
        let benefit = Benefit {
            id: Tables::next_id(tables.benefits.len()),
            title: new.title,
            description: new.description,
            icon_name: new.icon_name,
        };
        tables.benefits.push(benefit.clone());
        Ok(benefit)
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.tables.read().candidates.clone()
    }

    fn create_candidate(&self, mut new: NewCandidate) -> Result<Candidate, RepositoryError> {
        new.check().map_err(RepositoryError::Invalid)?;
        new.state = new.state.trim().to_uppercase();

        let mut tables = self.tables.write();
        let email = new.email.trim().to_lowercase();
        if tables.candidates.iter().any(|c| c.email.trim().to_lowercase() == email) {
            return Err(RepositoryError::DuplicateEmail(new.email));
        }
        if !tables.states.iter().any(|s| s.code == new.state) {
            return Err(RepositoryError::UnknownState(new.state));
        }

        let candidate = Candidate::from_new(Tables::next_id(tables.candidates.len()), new, Utc::now());
        tables.candidates.push(candidate.clone());
        Ok(candidate)
    }
}
