use crate::infra::{
    DevPaymentProvider, InMemoryArtifactStore, InMemoryOfferingStore, InMemoryReferralRepository,
    LoggingNotifier,
};
use clap::Args;
use referly::error::AppError;
use referly::workflows::referrals::{
    ActorRole, ArtifactStore, FeeKind, NewOffering, NewReferralRequest, OfferingCatalog,
    PaymentOrderOutcome, ReferralRequest, ReferralRequestId, ReferralService, ReferralStatus,
    TransitionPayload,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Currency for the demo payment orders (defaults to INR)
    #[arg(long)]
    pub(crate) currency: Option<String>,
    /// Skip the changes-requested/resubmission loop
    #[arg(long)]
    pub(crate) skip_revision: bool,
}

type DemoService =
    ReferralService<InMemoryReferralRepository, DevPaymentProvider, LoggingNotifier>;

/// End-to-end walkthrough of the referral lifecycle against in-memory
/// collaborators, printing each step and the resulting audit trail.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let currency = args.currency.unwrap_or_else(|| "INR".to_string());

    let repository = Arc::new(InMemoryReferralRepository::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let service: Arc<DemoService> = Arc::new(ReferralService::new(
        repository,
        Arc::new(DevPaymentProvider::default()),
        notifier.clone(),
        currency.clone(),
    ));
    let catalog = Arc::new(OfferingCatalog::new(Arc::new(
        InMemoryOfferingStore::default(),
    )));
    let artifacts = InMemoryArtifactStore::default();

    println!("Referral lifecycle demo ({currency})");

    let offering = catalog.create(NewOffering {
        mentor_id: "men-demo".to_string(),
        title: "Backend referrals at Nimbus Analytics".to_string(),
        description: "Referrals into backend and platform teams.".to_string(),
        companies: ["Nimbus Analytics".to_string()].into_iter().collect(),
        positions: ["Backend Engineer".to_string()].into_iter().collect(),
        initiation_fee_minor: 9_900,
        final_fee_minor: 199_900,
    })?;
    println!(
        "\nOffering published: {} ({} / {} minor units)",
        offering.title, offering.initiation_fee_minor, offering.final_fee_minor
    );

    let resume = artifacts.upload(
        b"%PDF-1.7 demo resume",
        &mime::APPLICATION_PDF,
        "resumes/stu-demo-v1.pdf",
    )?;

    let record = service.create_request(NewReferralRequest {
        student_id: "stu-demo".to_string(),
        mentor_id: offering.mentor_id.clone(),
        offering_id: Some(offering.id.clone()),
        company_name: "Nimbus Analytics".to_string(),
        position_name: "Backend Engineer".to_string(),
        job_link: Some("https://jobs.nimbus.example/backend-42".to_string()),
        resume,
        cover_letter: None,
        initiation_fee_minor: offering.initiation_fee_minor,
        final_fee_minor: offering.final_fee_minor,
    })?;
    println!(
        "Request {} opened in status '{}'",
        record.id.0,
        record.status.label()
    );

    pay_fee(&service, &record.id, FeeKind::Initiation)?;
    let record = transition(
        &service,
        &record.id,
        ActorRole::Student,
        ReferralStatus::ResumeReview,
        TransitionPayload::default(),
    )?;

    let record = if args.skip_revision {
        record
    } else {
        transition(
            &service,
            &record.id,
            ActorRole::Mentor,
            ReferralStatus::ChangesRequested,
            TransitionPayload {
                changes_requested: Some("Lead with the latency-reduction project".to_string()),
                ..TransitionPayload::default()
            },
        )?;
        let revised = artifacts.upload(
            b"%PDF-1.7 demo resume v2",
            &mime::APPLICATION_PDF,
            "resumes/stu-demo-v2.pdf",
        )?;
        transition(
            &service,
            &record.id,
            ActorRole::Student,
            ReferralStatus::ResumeReview,
            TransitionPayload {
                resume: Some(revised),
                ..TransitionPayload::default()
            },
        )?
    };

    transition(
        &service,
        &record.id,
        ActorRole::Mentor,
        ReferralStatus::ApprovedForReferral,
        TransitionPayload {
            feedback: Some("Profile is ready, submitting this week.".to_string()),
            ..TransitionPayload::default()
        },
    )?;

    let referral_proof = artifacts.upload(
        b"PNG referral confirmation",
        &mime::IMAGE_PNG,
        "proofs/referral-demo.png",
    )?;
    transition(
        &service,
        &record.id,
        ActorRole::Mentor,
        ReferralStatus::ReferralSent,
        TransitionPayload {
            proof: Some(referral_proof),
            ..TransitionPayload::default()
        },
    )?;

    let offer_proof = artifacts.upload(
        b"PNG offer letter screenshot",
        &mime::IMAGE_PNG,
        "proofs/offer-demo.png",
    )?;
    let record = transition(
        &service,
        &record.id,
        ActorRole::Mentor,
        ReferralStatus::ReferralAccepted,
        TransitionPayload {
            proof: Some(offer_proof),
            ..TransitionPayload::default()
        },
    )?;

    pay_fee(&service, &record.id, FeeKind::Final)?;
    let finished = service.get(&record.id)?;
    if finished.status == ReferralStatus::Completed {
        catalog.record_success(&offering.id)?;
    }

    render_outcome(&finished);

    let refreshed = catalog.get(&offering.id)?;
    println!(
        "\nOffering '{}' now counts {} successful referral(s)",
        refreshed.title, refreshed.referral_success_count
    );
    println!("Notifications delivered: {}", notifier.events().len());

    Ok(())
}

fn transition(
    service: &DemoService,
    id: &ReferralRequestId,
    actor: ActorRole,
    target: ReferralStatus,
    payload: TransitionPayload,
) -> Result<ReferralRequest, AppError> {
    let updated = service.request_transition(id, actor, target, payload)?;
    println!(
        "{} -> '{}' (requested by {})",
        id.0,
        updated.status.label(),
        actor.label()
    );
    Ok(updated)
}

fn pay_fee(service: &DemoService, id: &ReferralRequestId, kind: FeeKind) -> Result<(), AppError> {
    let order = match service.create_payment_order(id, kind)? {
        PaymentOrderOutcome::Created(order) => order,
        PaymentOrderOutcome::AlreadyPaid => {
            println!("{} fee already settled", kind.label());
            return Ok(());
        }
    };
    println!(
        "{} fee order {} for {} {} minor units",
        kind.label(),
        order.order_ref.0,
        order.amount_minor,
        order.currency
    );

    let outcome =
        service.apply_payment_verification(id, kind, &DevPaymentProvider::signed(&order.order_ref))?;
    println!(
        "{} fee verified, request status '{}'",
        kind.label(),
        outcome.status.label()
    );
    Ok(())
}

fn render_outcome(request: &ReferralRequest) {
    println!(
        "\nFinal status: {} [{}]",
        request.status.title(),
        request.status.badge_color()
    );
    println!(
        "Fees: initiation {} ({}), final {} ({})",
        request.initiation_fee.amount_minor,
        if request.initiation_fee.paid { "paid" } else { "unpaid" },
        request.final_fee.amount_minor,
        if request.final_fee.paid { "paid" } else { "unpaid" },
    );

    println!("\nTimeline");
    for entry in &request.timeline {
        let note = match &entry.note {
            Some(note) => format!(" ({note})"),
            None => String::new(),
        };
        println!(
            "- {} {} -> {} ({}){}",
            entry.at.format("%H:%M:%S"),
            entry.from.label(),
            entry.to.label(),
            entry.actor.label(),
            note
        );
    }
}
