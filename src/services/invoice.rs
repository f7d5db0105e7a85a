use crate::schemas::{Booking, PaymentMethod};

const RULE: &str = "------------------------";

/// Render the shareable text invoice for a booking.
///
/// Deterministic and stateless: everything comes from the stored snapshot,
/// so re-rendering an old booking never reflects later catalog changes. The
/// text is handed to the messaging deep-link builder; this module has no
/// network responsibility.
pub fn render_invoice(booking: &Booking) -> String {
    let mut out = String::new();

    out.push_str("Booking confirmed!\n\n");
    out.push_str("Booking invoice\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Booking id: #{}\n", booking.booking_id));
    out.push_str(&format!("Customer: {}\n", booking.customer_name));
    out.push_str(&format!("Phone: {}\n", booking.phone));
    out.push_str(RULE);
    out.push('\n');
    out.push_str("Requested services:\n");

    for item in &booking.services {
        out.push_str(&format!("- {}\n", item.name));
        out.push_str(&format!(
            "  {} {} x {} = {} EGP\n",
            item.quantity,
            item.pricing_type.unit_label(),
            format_money(item.unit_price),
            format_money(item.line_total),
        ));
    }

    out.push_str(RULE);
    out.push('\n');
    out.push_str("Totals:\n");
    out.push_str(&format!(
        "Base price: {} EGP\n",
        format_money(booking.base_price)
    ));

    match booking.payment_method {
        PaymentMethod::Electronic => {
            let remaining = booking.final_price - booking.advance_payment;
            out.push_str(&format!(
                "Electronic payment discount: -{} EGP\n",
                format_money(booking.discount_amount)
            ));
            out.push_str(&format!(
                "Net price: {} EGP\n",
                format_money(booking.final_price)
            ));
            out.push_str(&format!(
                "Advance payment: {} EGP\n",
                format_money(booking.advance_payment)
            ));
            out.push_str(&format!(
                "Remaining on completion: {} EGP\n",
                format_money(remaining)
            ));
        }
        PaymentMethod::Cash => {
            out.push_str(&format!(
                "Amount due on completion: {} EGP\n",
                format_money(booking.final_price)
            ));
        }
    }

    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("Address: {}\n", booking.address));
    out.push_str(&format!("Visit: {} | {}\n", booking.date, booking.time));
    if let Some(notes) = booking.notes.as_deref() {
        out.push_str(&format!("Notes: {notes}\n"));
    }
    if let Some(location) = booking.location.as_ref() {
        out.push_str(&format!("GPS location: {}\n", location.map_url));
    }
    if let Some(proof) = booking.payment_proof.as_ref() {
        out.push_str(&format!("Payment proof: {}\n", proof.url));
    }

    out
}

/// Thousands-separated amount, with cents only when they exist.
pub fn format_money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = ((amount.abs() * 100.0).round()) as i64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (index, character) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(character);
    }

    let mut result = String::new();
    if negative {
        result.push('-');
    }
    result.push_str(&grouped);
    if fraction != 0 {
        result.push_str(&format!(".{fraction:02}"));
    }
    result
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_money, render_invoice};
    use crate::schemas::{
        Booking, BookingStatus, GeoPoint, LineItem, PaymentMethod, Photo, PricingType,
    };

    fn booking(payment_method: PaymentMethod) -> Booking {
        Booking {
            booking_id: "CM-260807093000-1A2B3C".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 7, 9, 30, 0).unwrap(),
            status: BookingStatus::New,
            services: vec![
                LineItem {
                    service_id: "mosque_carpets".to_string(),
                    name: "Mosque carpet washing".to_string(),
                    pricing_type: PricingType::PerUnit,
                    unit_price: 7.0,
                    quantity: 100,
                    line_total: 700.0,
                },
                LineItem {
                    service_id: "sofa_steam_cleaning".to_string(),
                    name: "Sofa steam cleaning".to_string(),
                    pricing_type: PricingType::Fixed,
                    unit_price: 150.0,
                    quantity: 2,
                    line_total: 300.0,
                },
            ],
            payment_method,
            customer_name: "Ahmed".to_string(),
            phone: "01013373634".to_string(),
            address: "12 Main St".to_string(),
            date: "2026-08-10".to_string(),
            time: "10:00".to_string(),
            email: None,
            notes: Some("Second floor".to_string()),
            location: Some(GeoPoint {
                latitude: 30.0444,
                longitude: 31.2357,
                accuracy_meters: 12.0,
                map_url: "https://maps.google.com/?q=30.0444,31.2357".to_string(),
            }),
            photos: Vec::new(),
            payment_proof: None,
            base_price: 1000.0,
            final_price: if payment_method == PaymentMethod::Electronic {
                900.0
            } else {
                1000.0
            },
            discount_amount: if payment_method == PaymentMethod::Electronic {
                100.0
            } else {
                0.0
            },
            advance_payment: if payment_method == PaymentMethod::Electronic {
                225.0
            } else {
                0.0
            },
        }
    }

    #[test]
    fn electronic_invoice_lists_discount_advance_and_remaining() {
        let text = render_invoice(&booking(PaymentMethod::Electronic));
        assert!(text.contains("Booking id: #CM-260807093000-1A2B3C"));
        assert!(text.contains("100 meter x 7 = 700 EGP"));
        assert!(text.contains("2 piece x 150 = 300 EGP"));
        assert!(text.contains("Base price: 1,000 EGP"));
        assert!(text.contains("Electronic payment discount: -100 EGP"));
        assert!(text.contains("Net price: 900 EGP"));
        assert!(text.contains("Advance payment: 225 EGP"));
        assert!(text.contains("Remaining on completion: 675 EGP"));
        assert!(!text.contains("Amount due on completion"));
    }

    #[test]
    fn cash_invoice_has_a_single_amount_due_line() {
        let text = render_invoice(&booking(PaymentMethod::Cash));
        assert!(text.contains("Amount due on completion: 1,000 EGP"));
        assert!(!text.contains("Advance payment"));
        assert!(!text.contains("discount"));
    }

    #[test]
    fn sections_keep_their_documented_order() {
        let text = render_invoice(&booking(PaymentMethod::Cash));
        let index_of = |needle: &str| text.find(needle).unwrap_or(usize::MAX);
        assert!(index_of("Booking id") < index_of("Customer"));
        assert!(index_of("Customer") < index_of("Requested services"));
        assert!(index_of("Requested services") < index_of("Base price"));
        assert!(index_of("Base price") < index_of("Address"));
        assert!(index_of("Address") < index_of("Visit"));
        assert!(index_of("Visit") < index_of("Notes"));
        assert!(index_of("Notes") < index_of("GPS location"));
    }

    #[test]
    fn optional_sections_are_omitted_when_absent() {
        let mut record = booking(PaymentMethod::Cash);
        record.notes = None;
        record.location = None;
        let text = render_invoice(&record);
        assert!(!text.contains("Notes:"));
        assert!(!text.contains("GPS location:"));
        assert!(!text.contains("Payment proof:"));
    }

    #[test]
    fn money_formatting_groups_thousands_and_trims_whole_amounts() {
        assert_eq!(format_money(0.0), "0");
        assert_eq!(format_money(7.0), "7");
        assert_eq!(format_money(1050.0), "1,050");
        assert_eq!(format_money(1234567.5), "1,234,567.50");
        assert_eq!(format_money(225.23), "225.23");
        assert_eq!(format_money(-100.0), "-100");
    }
}
