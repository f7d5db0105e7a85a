use crate::error::AppError;
use crate::schemas::{LineItem, PaymentMethod, PricingType, Quote, ServiceDefinition};

/// Validation failures raised while building a cart. Converted to HTTP
/// errors at the route boundary; the variants stay typed so callers (and the
/// assistant's finalize tool) can react to the specific rule that failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Service '{0}' is not in the catalog.")]
    ServiceNotFound(String),
    #[error("Service '{0}' has already been added.")]
    DuplicateSelection(String),
    #[error("The minimum is {minimum} {unit_label}.")]
    BelowMinimum {
        minimum: i64,
        unit_label: &'static str,
    },
}

impl From<PricingError> for AppError {
    fn from(error: PricingError) -> Self {
        match &error {
            PricingError::ServiceNotFound(_) => AppError::NotFound(error.to_string()),
            PricingError::DuplicateSelection(_) => AppError::Conflict(error.to_string()),
            PricingError::BelowMinimum { .. } => AppError::BadRequest(error.to_string()),
        }
    }
}

/// Round a monetary amount to two decimal places. Applied at computation
/// time so stored snapshots never accumulate float drift.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Customer-typed quantity: anything that does not parse as an integer
/// counts as zero and is caught by the minimum checks.
fn parse_quantity(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

/// Price one (service, quantity) selection into a line item.
///
/// A service id may appear at most once per cart; catalog fields are copied
/// into the line item so later catalog edits never change an existing cart.
pub fn add_service(
    catalog: &[ServiceDefinition],
    existing: &[LineItem],
    service_id: &str,
    raw_quantity: &str,
    minimum_area: i64,
) -> Result<LineItem, PricingError> {
    let service = crate::services::catalog::find_service(catalog, service_id)
        .ok_or_else(|| PricingError::ServiceNotFound(service_id.trim().to_string()))?;

    if existing.iter().any(|item| item.service_id == service.id) {
        return Err(PricingError::DuplicateSelection(service.id.clone()));
    }

    let quantity = match service.pricing_type {
        PricingType::Consultation => 1,
        PricingType::PerUnit => {
            let quantity = parse_quantity(raw_quantity);
            if quantity < minimum_area {
                return Err(PricingError::BelowMinimum {
                    minimum: minimum_area,
                    unit_label: "meter",
                });
            }
            quantity
        }
        PricingType::Fixed => {
            let quantity = parse_quantity(raw_quantity);
            if quantity < 1 {
                return Err(PricingError::BelowMinimum {
                    minimum: 1,
                    unit_label: "piece",
                });
            }
            quantity
        }
    };

    Ok(LineItem {
        service_id: service.id.clone(),
        name: service.name.clone(),
        pricing_type: service.pricing_type,
        unit_price: service.unit_price,
        quantity,
        line_total: round2(service.unit_price * quantity as f64),
    })
}

/// Remove a selection by service id. Removing an id that is not present is
/// a no-op, not an error.
pub fn remove_service(items: &mut Vec<LineItem>, service_id: &str) {
    items.retain(|item| item.service_id != service_id.trim());
}

pub fn base_price(items: &[LineItem]) -> f64 {
    round2(items.iter().map(|item| item.line_total).sum())
}

/// Derive the aggregate quote for the current cart.
///
/// Pure function; an empty cart yields a zero quote — rejecting empty carts
/// is the submission flow's job. Cash pays the base price on completion;
/// electronic payment earns the discount and owes the advance up front.
pub fn compute_quote(
    items: &[LineItem],
    payment_method: PaymentMethod,
    discount_rate: f64,
    advance_rate: f64,
) -> Quote {
    let base = base_price(items);

    match payment_method {
        PaymentMethod::Cash => Quote {
            base_price: base,
            payment_method,
            discount_amount: 0.0,
            net_price: base,
            advance_payment: 0.0,
            remaining_balance: None,
        },
        PaymentMethod::Electronic => {
            let discount_amount = round2(base * discount_rate);
            let net_price = round2(base - discount_amount);
            let advance_payment = round2(net_price * advance_rate);
            Quote {
                base_price: base,
                payment_method,
                discount_amount,
                net_price,
                advance_payment,
                remaining_balance: Some(round2(net_price - advance_payment)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{add_service, base_price, compute_quote, remove_service, round2, PricingError};
    use crate::schemas::{PaymentMethod, PricingType, ServiceDefinition};

    const MINIMUM_AREA: i64 = 100;

    fn catalog() -> Vec<ServiceDefinition> {
        let entry = |id: &str, pricing_type: PricingType, unit_price: f64| ServiceDefinition {
            id: id.to_string(),
            name: id.replace('_', " "),
            pricing_type,
            unit_price,
            category: String::new(),
            description: String::new(),
            includes: Vec::new(),
            is_active: true,
        };
        vec![
            entry("mosque_carpets", PricingType::PerUnit, 7.0),
            entry("sofa_steam_cleaning", PricingType::Fixed, 150.0),
            entry("post_construction_visit", PricingType::Consultation, 0.0),
        ]
    }

    #[test]
    fn per_unit_below_minimum_is_rejected_with_the_minimum_in_the_message() {
        let error = add_service(&catalog(), &[], "mosque_carpets", "50", MINIMUM_AREA)
            .expect_err("50 is below the minimum area");
        assert_eq!(
            error,
            PricingError::BelowMinimum {
                minimum: 100,
                unit_label: "meter"
            }
        );
        assert!(error.to_string().contains("100"));

        // 99 fails, exactly the minimum succeeds.
        assert!(add_service(&catalog(), &[], "mosque_carpets", "99", MINIMUM_AREA).is_err());
        assert!(add_service(&catalog(), &[], "mosque_carpets", "100", MINIMUM_AREA).is_ok());
    }

    #[test]
    fn per_unit_line_total_is_price_times_quantity() {
        let item = add_service(&catalog(), &[], "mosque_carpets", "150", MINIMUM_AREA).unwrap();
        assert_eq!(item.quantity, 150);
        assert_eq!(item.line_total, 1050.0);
    }

    #[test]
    fn non_numeric_quantity_counts_as_zero() {
        let error = add_service(&catalog(), &[], "mosque_carpets", "plenty", MINIMUM_AREA)
            .expect_err("non-numeric quantity");
        assert!(matches!(error, PricingError::BelowMinimum { .. }));

        let error = add_service(&catalog(), &[], "sofa_steam_cleaning", "", MINIMUM_AREA)
            .expect_err("blank quantity");
        assert_eq!(
            error,
            PricingError::BelowMinimum {
                minimum: 1,
                unit_label: "piece"
            }
        );
    }

    #[test]
    fn consultation_quantity_is_forced_to_one() {
        let item =
            add_service(&catalog(), &[], "post_construction_visit", "37", MINIMUM_AREA).unwrap();
        assert_eq!(item.quantity, 1);
        assert_eq!(item.line_total, 0.0);
    }

    #[test]
    fn unknown_service_is_not_found() {
        let error = add_service(&catalog(), &[], "window_washing", "5", MINIMUM_AREA)
            .expect_err("unknown id");
        assert_eq!(
            error,
            PricingError::ServiceNotFound("window_washing".to_string())
        );
    }

    #[test]
    fn duplicate_selection_is_rejected_regardless_of_quantity() {
        let first = add_service(&catalog(), &[], "sofa_steam_cleaning", "2", MINIMUM_AREA).unwrap();
        let error = add_service(&catalog(), &[first], "sofa_steam_cleaning", "5", MINIMUM_AREA)
            .expect_err("same service twice");
        assert_eq!(
            error,
            PricingError::DuplicateSelection("sofa_steam_cleaning".to_string())
        );
    }

    #[test]
    fn removal_is_idempotent() {
        let mut items = vec![
            add_service(&catalog(), &[], "mosque_carpets", "150", MINIMUM_AREA).unwrap(),
        ];

        remove_service(&mut items, "not_in_cart");
        assert_eq!(items.len(), 1);

        remove_service(&mut items, "mosque_carpets");
        assert!(items.is_empty());

        remove_service(&mut items, "mosque_carpets");
        assert!(items.is_empty());
    }

    #[test]
    fn electronic_quote_applies_discount_then_advance() {
        // base 1000, 10% discount, 25% advance.
        let items = vec![
            add_service(&catalog(), &[], "mosque_carpets", "100", MINIMUM_AREA).unwrap(),
            add_service(&catalog(), &[], "sofa_steam_cleaning", "2", MINIMUM_AREA).unwrap(),
        ];
        assert_eq!(base_price(&items), 1000.0);

        let quote = compute_quote(&items, PaymentMethod::Electronic, 0.10, 0.25);
        assert_eq!(quote.base_price, 1000.0);
        assert_eq!(quote.discount_amount, 100.0);
        assert_eq!(quote.net_price, 900.0);
        assert_eq!(quote.advance_payment, 225.0);
        assert_eq!(quote.remaining_balance, Some(675.0));
        assert!(quote.advance_payment <= quote.net_price);
    }

    #[test]
    fn cash_quote_has_no_discount_and_no_advance() {
        let items = vec![
            add_service(&catalog(), &[], "sofa_steam_cleaning", "3", MINIMUM_AREA).unwrap(),
        ];
        let quote = compute_quote(&items, PaymentMethod::Cash, 0.10, 0.25);
        assert_eq!(quote.base_price, 450.0);
        assert_eq!(quote.discount_amount, 0.0);
        assert_eq!(quote.net_price, 450.0);
        assert_eq!(quote.advance_payment, 0.0);
        assert_eq!(quote.remaining_balance, None);
    }

    #[test]
    fn empty_cart_quotes_to_zero() {
        let quote = compute_quote(&[], PaymentMethod::Electronic, 0.10, 0.25);
        assert_eq!(quote.base_price, 0.0);
        assert_eq!(quote.net_price, 0.0);
    }

    #[test]
    fn monetary_values_are_rounded_at_computation_time() {
        assert_eq!(round2(33.333), 33.33);
        assert_eq!(round2(33.337), 33.34);

        let items = vec![
            add_service(&catalog(), &[], "mosque_carpets", "143", MINIMUM_AREA).unwrap(),
        ];
        // base 1001, 10% discount → 100.1, net 900.9, advance 225.23 (not 225.225).
        let quote = compute_quote(&items, PaymentMethod::Electronic, 0.10, 0.25);
        assert_eq!(quote.discount_amount, 100.1);
        assert_eq!(quote.net_price, 900.9);
        assert_eq!(quote.advance_payment, 225.23);
        assert_eq!(quote.remaining_balance, Some(675.67));
    }
}
