//! Municipality selection and start-date options
//!
//! - Static municipality catalog per state code
//! - Random daily delivery estimates per offered municipality
//! - Toggle / toggle-all selection with delivery and earnings totals
//! - Start-date choices for the next three days

use crate::types::{Municipality, DELIVERY_FEE_BRL};
use crate::validation::{Field, ValidationErrors};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Range of daily deliveries offered per municipality
pub const DAILY_ESTIMATE_RANGE: RangeInclusive<u32> = 32..=48;

/// Start-date value meaning "another day"
pub const OTHER_START_DATE: &str = "outro";

const CATALOG: &[(&str, &[&str])] = &[
    ("AC", &["Rio Branco", "Cruzeiro do Sul", "Sena Madureira", "Tarauacá", "Feijó"]),
    ("AL", &["Maceió", "Arapiraca", "Rio Largo", "Palmeira dos Índios", "União dos Palmares"]),
    ("AP", &["Macapá", "Santana", "Laranjal do Jari", "Oiapoque", "Mazagão"]),
    ("AM", &["Manaus", "Parintins", "Itacoatiara", "Manacapuru", "Coari"]),
    ("BA", &["Salvador", "Feira de Santana", "Vitória da Conquista", "Camaçari", "Itabuna", "Juazeiro"]),
    ("CE", &["Fortaleza", "Caucaia", "Juazeiro do Norte", "Maracanaú", "Sobral"]),
    ("DF", &["Brasília", "Ceilândia", "Taguatinga", "Samambaia", "Planaltina"]),
    ("ES", &["Vitória", "Vila Velha", "Serra", "Cariacica", "Cachoeiro de Itapemirim"]),
    ("GO", &["Goiânia", "Aparecida de Goiânia", "Anápolis", "Rio Verde", "Luziânia"]),
    ("MA", &["São Luís", "Imperatriz", "São José de Ribamar", "Timon", "Caxias"]),
    ("MT", &["Cuiabá", "Várzea Grande", "Rondonópolis", "Sinop", "Tangará da Serra"]),
    ("MS", &["Campo Grande", "Dourados", "Três Lagoas", "Corumbá", "Ponta Porã"]),
    ("MG", &["Belo Horizonte", "Uberlândia", "Contagem", "Juiz de Fora", "Betim", "Montes Claros"]),
    ("PA", &["Belém", "Ananindeua", "Santarém", "Marabá", "Castanhal"]),
    ("PB", &["João Pessoa", "Campina Grande", "Santa Rita", "Patos", "Bayeux"]),
    ("PR", &["Curitiba", "Londrina", "Maringá", "Ponta Grossa", "Cascavel", "São José dos Pinhais"]),
    ("PE", &["Recife", "Jaboatão dos Guararapes", "Olinda", "Caruaru", "Petrolina"]),
    ("PI", &["Teresina", "Parnaíba", "Picos", "Piripiri", "Floriano"]),
    ("RJ", &["Rio de Janeiro", "São Gonçalo", "Duque de Caxias", "Nova Iguaçu", "Niterói", "Belford Roxo"]),
    ("RN", &["Natal", "Mossoró", "Parnamirim", "São Gonçalo do Amarante", "Macaíba"]),
    ("RS", &["Porto Alegre", "Caxias do Sul", "Canoas", "Pelotas", "Santa Maria", "Gravataí"]),
    ("RO", &["Porto Velho", "Ji-Paraná", "Ariquemes", "Vilhena", "Cacoal"]),
    ("RR", &["Boa Vista", "Rorainópolis", "Caracaraí", "Alto Alegre", "Mucajaí"]),
    ("SC", &["Joinville", "Florianópolis", "Blumenau", "São José", "Itajaí", "Chapecó"]),
    ("SP", &["São Paulo", "Guarulhos", "Campinas", "São Bernardo do Campo", "Santo André", "Osasco", "Ribeirão Preto", "Sorocaba"]),
    ("SE", &["Aracaju", "Nossa Senhora do Socorro", "Lagarto", "Itabaiana", "São Cristóvão"]),
    ("TO", &["Palmas", "Araguaína", "Gurupi", "Porto Nacional", "Paraíso do Tocantins"]),
];

/// Municipality names served in a state
#[must_use]
pub fn catalog(state_code: &str) -> Option<&'static [&'static str]> {
    let code = state_code.trim().to_uppercase();
    CATALOG
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, names)| *names)
}

/// State codes with a municipality catalog
pub fn state_codes() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|(code, _)| *code)
}

/// One offered municipality and whether it is picked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityOption {
    /// Municipality with its delivery estimate
    pub municipality: Municipality,
    /// Picked by the candidate
    pub selected: bool,
}

/// Municipalities offered on the selection step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MunicipalitySelection {
    options: Vec<MunicipalityOption>,
}

impl MunicipalitySelection {
    /// Offer every catalog municipality of a state, none selected
    ///
    /// Returns `None` for an unknown state code.
    pub fn offer<R: Rng + ?Sized>(state_code: &str, rng: &mut R) -> Option<Self> {
        let names = catalog(state_code)?;
        let municipalities = names
            .iter()
            .map(|name| Municipality::new(*name, rng.gen_range(DAILY_ESTIMATE_RANGE)))
            .collect();
        Some(Self::from_municipalities(municipalities))
    }

    /// Offer explicit municipalities, none selected
    #[must_use]
    pub fn from_municipalities(municipalities: Vec<Municipality>) -> Self {
        Self {
            options: municipalities
                .into_iter()
                .map(|municipality| MunicipalityOption {
                    municipality,
                    selected: false,
                })
                .collect(),
        }
    }

    /// Offered options in order
    #[inline]
    #[must_use]
    pub fn options(&self) -> &[MunicipalityOption] {
        &self.options
    }

    /// Flip one option; returns its new state, or `None` when out of range
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let option = self.options.get_mut(index)?;
        option.selected = !option.selected;
        Some(option.selected)
    }

    /// Select all unless all are selected, then clear all
    pub fn toggle_all(&mut self) {
        let select = !self.all_selected();
        for option in &mut self.options {
            option.selected = select;
        }
    }

    /// True when every option is picked
    #[must_use]
    pub fn all_selected(&self) -> bool {
        !self.options.is_empty() && self.options.iter().all(|o| o.selected)
    }

    /// Picked municipalities in offer order
    #[must_use]
    pub fn selected(&self) -> Vec<Municipality> {
        self.options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.municipality.clone())
            .collect()
    }

    /// Estimated deliveries per day across the picked options
    #[must_use]
    pub fn total_deliveries(&self) -> u32 {
        self.options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.municipality.daily_delivery_estimate)
            .sum()
    }

    /// Estimated earnings per day across the picked options
    #[must_use]
    pub fn total_earnings(&self) -> f64 {
        f64::from(self.total_deliveries()) * DELIVERY_FEE_BRL
    }

    /// Require at least one pick
    ///
    /// # Errors
    /// Returns a municipality field error when nothing is picked
    pub fn validate(&self) -> Result<Vec<Municipality>, ValidationErrors> {
        let selected = self.selected();
        if selected.is_empty() {
            return Err(ValidationErrors::single(
                Field::Municipalities,
                "Select at least one municipality to continue",
            ));
        }
        Ok(selected)
    }
}

/// One start-date choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDateOption {
    /// Display label, e.g. `Segunda-feira 03/03`
    pub label: String,
    /// Stored value, e.g. `03/03/2025`
    pub value: String,
}

fn weekday_pt(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Domingo",
        Weekday::Mon => "Segunda-feira",
        Weekday::Tue => "Terça-feira",
        Weekday::Wed => "Quarta-feira",
        Weekday::Thu => "Quinta-feira",
        Weekday::Fri => "Sexta-feira",
        Weekday::Sat => "Sábado",
    }
}

/// The next three days after `today`, plus "another day"
#[must_use]
pub fn start_date_options(today: NaiveDate) -> Vec<StartDateOption> {
    let mut options: Vec<StartDateOption> = (1..=3)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| StartDateOption {
            label: format!(
                "{} {:02}/{:02}",
                weekday_pt(date.weekday()),
                date.day(),
                date.month()
            ),
            value: format!("{:02}/{:02}/{}", date.day(), date.month(), date.year()),
        })
        .collect();
    options.push(StartDateOption {
        label: "Outro dia".to_string(),
        value: OTHER_START_DATE.to_string(),
    });
    options
}

/// Require one of the offered start dates
///
/// # Errors
/// Returns a start-date field error when nothing or an unknown value is chosen
pub fn validate_start_date(
    choice: Option<&str>,
    options: &[StartDateOption],
) -> Result<String, ValidationErrors> {
    match choice {
        Some(value) if options.iter().any(|o| o.value == value) => Ok(value.to_string()),
        Some(_) => Err(ValidationErrors::single(Field::StartDate, "Choose one of the offered dates")),
        None => Err(ValidationErrors::single(Field::StartDate, "Choose a start date")),
    }
}
