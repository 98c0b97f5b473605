use funnel_core::types::CandidateRecord;
use funnel_core::validation::{
    format_cpf, normalize_plate, validate_license_plate, validate_phone, validate_tax_id,
    validate_vehicle_section, EpiForm, Field, ProfileForm,
};
use funnel_core::wizard::{allowed_transitions, validate_transition, StepPhase};
use proptest::prelude::*;
use regex::Regex;

fn rented_profile() -> ProfileForm {
    ProfileForm {
        full_name: "Jane Doe".to_string(),
        tax_id: "123.456.789-09".to_string(),
        phone: "(11) 98888-7777".to_string(),
        email: "a@b.com".to_string(),
        is_rented_vehicle: true,
        license_plate: None,
        ..ProfileForm::default()
    }
}

#[test]
fn test_vehicle_section_refinement() {
    let mut form = rented_profile();
    form.license_plate = Some(String::new());
    assert!(validate_vehicle_section(&form));

    form.is_rented_vehicle = false;
    assert!(!validate_vehicle_section(&form));
}

#[test]
fn test_rented_profile_persists_without_plate() {
    let form = rented_profile();
    let mut record = CandidateRecord::default();

    form.apply_to(&mut record).unwrap();

    assert!(record.license_plate.is_none());
    assert_eq!(record.tax_id, "12345678909");
    assert_eq!(record.phone, "11988887777");
}

#[test]
fn test_plate_scenarios() {
    assert_eq!(normalize_plate("ABC1234"), "ABC1234");
    assert!(validate_license_plate("ABC1234"));
    assert!(validate_license_plate("ABC1D23"));
    assert!(!validate_license_plate("AB1234"));
}

#[test]
fn test_terms_block_epi_step() {
    let form = EpiForm {
        vest_size: "G".to_string(),
        glove_size: "P".to_string(),
        shoe_size: "42".to_string(),
        terms_accepted: false,
    };

    let errors = form.validate().unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(errors.has(Field::TermsAccepted));
}

#[test]
fn test_each_failing_field_gets_its_own_message() {
    let form = ProfileForm {
        full_name: "Jo".to_string(),
        tax_id: "1".to_string(),
        phone: "2".to_string(),
        email: "nope".to_string(),
        license_plate: Some("XX".to_string()),
        ..ProfileForm::default()
    };

    let errors = form.validate().unwrap_err();

    for field in [Field::FullName, Field::TaxId, Field::Phone, Field::Email, Field::LicensePlate] {
        assert!(errors.has(field), "missing error for {field}");
    }
}

proptest! {
    #[test]
    fn prop_tax_id_iff_eleven_digits(s in ".{0,24}") {
        let digit_count = s.chars().filter(char::is_ascii_digit).count();
        prop_assert_eq!(validate_tax_id(&s), digit_count == 11);
    }

    #[test]
    fn prop_tax_id_accepts_any_formatting(d in "[0-9]{11}", sep in "[ .\\-/]{0,3}") {
        let formatted = format!("{}{}{}{}{}", &d[..3], sep, &d[3..6], sep, &d[6..]);
        prop_assert!(validate_tax_id(&formatted));
        prop_assert!(validate_tax_id(&format_cpf(&d)));
    }

    #[test]
    fn prop_phone_ten_or_eleven_digits(s in "[0-9() \\-]{0,20}") {
        let digit_count = s.chars().filter(char::is_ascii_digit).count();
        prop_assert_eq!(validate_phone(&s), digit_count == 10 || digit_count == 11);
    }

    #[test]
    fn prop_plate_matches_either_format(s in "[A-Za-z0-9 \\-]{0,10}") {
        let legacy = Regex::new(r"^[A-Z]{3}\d{4}$").unwrap();
        let mercosul = Regex::new(r"^[A-Z]{3}\d[A-Z]\d{2}$").unwrap();
        let normalized: String = s
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_uppercase();

        let expected = legacy.is_match(&normalized) || mercosul.is_match(&normalized);
        prop_assert_eq!(validate_license_plate(&s), expected);
    }

    #[test]
    fn prop_shoe_size_bounds(size in 0u8..=99) {
        let form = EpiForm {
            shoe_size: size.to_string(),
            terms_accepted: true,
            ..EpiForm::default()
        };
        prop_assert_eq!(form.validate().is_ok(), (35..=45).contains(&size));
    }

    #[test]
    fn prop_phase_transitions_match_table(
        from in prop_oneof![
            Just(StepPhase::Editing),
            Just(StepPhase::Validating),
            Just(StepPhase::Invalid),
            Just(StepPhase::Valid),
            Just(StepPhase::Persisting),
            Just(StepPhase::Loading),
            Just(StepPhase::Navigating),
        ],
        to in prop_oneof![
            Just(StepPhase::Editing),
            Just(StepPhase::Validating),
            Just(StepPhase::Invalid),
            Just(StepPhase::Valid),
            Just(StepPhase::Persisting),
            Just(StepPhase::Loading),
            Just(StepPhase::Navigating),
        ]
    ) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }
}
