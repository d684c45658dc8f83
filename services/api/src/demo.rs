use crate::infra::{in_memory_referral_state, parse_date, parse_locale, parse_policy};
use chrono::{Days, Local, NaiveDate};
use clap::Args;
use neobridge::config::ReferralConfig;
use neobridge::error::AppError;
use neobridge::referrals::{
    calculate_age, AssignmentPolicy, BedCountsUpdate, CaseStatus, CaseSubmission, CaseUpdate,
    Locale, ServiceType,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Patient date of birth (YYYY-MM-DD). Defaults to ten days ago.
    #[arg(long, value_parser = parse_date)]
    pub(crate) born: Option<NaiveDate>,
    /// Language for generated text (ar or en).
    #[arg(long, value_parser = parse_locale)]
    pub(crate) locale: Option<Locale>,
    /// How assignment treats bed counts (record-only or reserve-bed).
    #[arg(long, value_parser = parse_policy)]
    pub(crate) policy: Option<AssignmentPolicy>,
    /// Hospital identifier used for the assignment step.
    #[arg(long, default_value = "demo-hospital")]
    pub(crate) hospital: String,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        born,
        locale,
        policy,
        hospital,
    } = args;

    let today = Local::now().date_naive();
    let born = born
        .or_else(|| today.checked_sub_days(Days::new(10)))
        .unwrap_or(today);
    let config = ReferralConfig {
        locale: locale.unwrap_or_default(),
        assignment_policy: policy.unwrap_or_default(),
        ..ReferralConfig::default()
    };
    let state = in_memory_referral_state(&config);

    println!("NeoBridge referral demo");
    if let Some(age) = calculate_age(born, today) {
        let assessment = state.detector.detect(age.in_months()).await;
        println!(
            "- Patient born {born} ({}) -> {} unit",
            age.display(config.locale),
            assessment.service_type
        );
        println!("  Justification: {}", assessment.justification);
    }

    let submission = CaseSubmission {
        patient_name: "Demo Patient".to_string(),
        date_of_birth: born.format("%Y-%m-%d").to_string(),
        contact_phone: "+966500000000".to_string(),
        other_contact_phone: None,
        contact_email: "referrals@example.com".to_string(),
        referring_hospital: "Demo Maternity".to_string(),
        has_insurance: true,
        medical_report_url: None,
        identity_document_url: None,
    };
    let record = match state.cases.create(submission) {
        Ok(record) => record,
        Err(err) => {
            println!("  Submission rejected: {}", err.user_message(config.locale));
            return Ok(());
        }
    };
    println!("- Received case {} -> status {}", record.id, record.status);

    let unit = record.service_type;
    let mut counts = BedCountsUpdate::default();
    match unit {
        ServiceType::Nicu => counts.nicu = 2,
        ServiceType::Picu => counts.picu = 2,
        ServiceType::Icu => counts.icu = 2,
    }
    let capacity = state.ledger.update(&hospital, counts)?;
    println!(
        "- {} reports beds: NICU {} | PICU {} | ICU {}",
        capacity.name, capacity.beds.nicu, capacity.beds.picu, capacity.beds.icu
    );

    state.cases.update(
        record.id.as_str(),
        CaseUpdate {
            status: Some(CaseStatus::Reviewed),
            admin_note: Some("Reviewed by the on-call coordinator".to_string()),
        },
    )?;
    println!("- Case reviewed");

    let assigned = state
        .assignments
        .assign(record.id.as_str(), &hospital, "demo-operator")?;
    let view = assigned.status_view();
    println!(
        "- Case {} -> status {} at {}",
        view.case_number,
        view.status,
        view.assigned_to.as_deref().unwrap_or("-")
    );
    if let Some(note) = &view.last_update_note {
        println!("  Last note: {note}");
    }

    let remaining = state.ledger.get(&hospital)?;
    println!(
        "- {} {} beds remaining under {:?} policy",
        remaining.beds.for_unit(unit),
        unit,
        state.assignments.policy()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_for_each_policy() {
        for policy in [AssignmentPolicy::RecordOnly, AssignmentPolicy::ReserveBed] {
            let args = DemoArgs {
                born: NaiveDate::from_ymd_opt(2016, 6, 1),
                locale: Some(Locale::English),
                policy: Some(policy),
                hospital: "demo-hospital".to_string(),
            };
            run_demo(args).await.expect("demo completes");
        }
    }
}
