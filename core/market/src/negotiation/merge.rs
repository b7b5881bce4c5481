//! Consolidation of several negotiations with the same parties into one.

use scm_persistence::types::Summable;

use crate::db::model::{ListingQuantity, OfferSession, OfferTerms, RevisionView};
use crate::negotiation::error::MismatchKind;

const TITLE_SEPARATOR: &str = " + ";
const DESCRIPTION_SEPARATOR: &str = "\n\n";
const MIXED_KIND: &str = "Multiple";

/// Sessions can be merged only when they have the same customer, the same seller,
/// the same payment type and no service bound.
pub fn check_compatible(sessions: &[(OfferSession, RevisionView)]) -> Result<(), MismatchKind> {
    let (first, first_terms) = match sessions.first() {
        Some(first) => first,
        None => return Ok(()),
    };

    for (session, current) in sessions {
        if session.customer_id != first.customer_id {
            return Err(MismatchKind::DifferentCustomer);
        }
        match (&first.contractor_id, &first.assigned_id) {
            (Some(contractor_id), _) => {
                if session.contractor_id.as_ref() != Some(contractor_id) {
                    return Err(MismatchKind::DifferentContractor);
                }
            }
            (None, assigned_id) => {
                if session.contractor_id.is_some() || &session.assigned_id != assigned_id {
                    return Err(MismatchKind::DifferentAssigned);
                }
            }
        }
        if current.revision.payment_type != first_terms.revision.payment_type {
            return Err(MismatchKind::DifferentPaymentType);
        }
    }

    if sessions
        .iter()
        .any(|(_, current)| current.revision.service_id.is_some())
    {
        return Err(MismatchKind::HasServices);
    }
    Ok(())
}

/// Terms of the consolidated offer. Amounts are summed exactly.
pub fn compose(currents: &[&RevisionView]) -> OfferTerms {
    let revisions = currents
        .iter()
        .map(|current| &current.revision)
        .collect::<Vec<_>>();

    let cost = Summable::sum(revisions.iter().map(|revision| revision.cost.clone()));
    let collateral = Summable::sum(revisions.iter().map(|revision| revision.collateral.clone()));

    let title = match all_same(revisions.iter().map(|revision| revision.title.as_str())) {
        Some(title) => title.to_string(),
        None => revisions
            .iter()
            .map(|revision| revision.title.as_str())
            .collect::<Vec<_>>()
            .join(TITLE_SEPARATOR),
    };
    let kind = all_same(revisions.iter().map(|revision| revision.kind.as_str()))
        .unwrap_or(MIXED_KIND)
        .to_string();
    let description = revisions
        .iter()
        .map(|revision| revision.description.trim())
        .filter(|description| !description.is_empty())
        .collect::<Vec<_>>()
        .join(DESCRIPTION_SEPARATOR);

    let mut market_listings: Vec<ListingQuantity> = vec![];
    for line in currents.iter().flat_map(|current| &current.market_listings) {
        match market_listings
            .iter_mut()
            .find(|merged| merged.listing_id == line.listing_id)
        {
            Some(merged) => merged.quantity = merged.quantity.saturating_add(line.quantity),
            None => market_listings.push(line.clone()),
        }
    }

    OfferTerms {
        title,
        description,
        kind,
        cost,
        collateral,
        payment_type: revisions
            .first()
            .map(|revision| revision.payment_type)
            .unwrap_or(crate::db::model::PaymentType::OneTime),
        departure: revisions.iter().find_map(|revision| revision.departure.clone()),
        destination: revisions
            .iter()
            .find_map(|revision| revision.destination.clone()),
        service_id: None,
        market_listings,
    }
}

fn all_same<'a>(mut values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let first = values.next()?;
    values.all(|value| value == first).then(|| first)
}
