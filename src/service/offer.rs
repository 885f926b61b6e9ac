use std::str::FromStr;

use bigdecimal::BigDecimal;
use tracing::{error, info};

use super::notice::Prompt;
use crate::client::Webhooks;
use crate::error::{DeskError, DeskResult};
use crate::models::record::PLACEHOLDER;
use crate::models::{safe_value, MatchData, OfferPayload, ResponseView};

pub const INVALID_PRICE: &str = "Please enter a valid price!";
pub const WHATSAPP_MISSING: &str = "Customer WhatsApp number not available!";
pub const OFFER_FAILED: &str = "Failed to send offer. Please try again.";

/// 报价必须是正数
pub fn parse_offer_price(input: &str) -> Option<BigDecimal> {
    let price = BigDecimal::from_str(input.trim()).ok()?;
    (price > BigDecimal::from(0_i64)).then_some(price)
}

fn build_payload(match_data: &MatchData, response: &ResponseView, offer_price: &str) -> OfferPayload {
    OfferPayload {
        match_id: match_data.match_id.clone(),
        customer_name: match_data.customer_name.clone(),
        customer_whatsapp: match_data.customer_whatsapp.clone(),
        customer_email: match_data.customer_email.clone(),
        product: match_data.product_req.clone(),
        quantity: match_data.quantity.clone(),
        vendor_name: match_data.vendor_name.clone(),
        vendor_price: safe_value(response.vendor_price.as_ref()),
        offer_price: offer_price.to_string(),
        available_qty: safe_value(response.available_qty.as_ref()),
        can_deliver: response
            .can_deliver
            .clone()
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}

/// 向客户发送报价
///
/// 返回 `Ok(false)` 表示操作员取消确认。
pub async fn send_offer(
    webhooks: &dyn Webhooks,
    match_data: &MatchData,
    response: &ResponseView,
    price_input: &str,
    prompt: &dyn Prompt,
) -> DeskResult<bool> {
    let offer_price = price_input.trim();
    if parse_offer_price(offer_price).is_none() {
        prompt.alert(INVALID_PRICE);
        return Err(DeskError::Validation(INVALID_PRICE.to_string()));
    }
    if !match_data.has_customer_whatsapp() {
        prompt.alert(WHATSAPP_MISSING);
        return Err(DeskError::Validation(WHATSAPP_MISSING.to_string()));
    }

    let payload = build_payload(match_data, response, offer_price);
    let confirmation = format!(
        "Send offer to customer?\n\nCustomer: {}\nProduct: {}\nOffer Price: ₹{}\nVendor Price: ₹{}",
        match_data.customer_name, match_data.product_req, offer_price, payload.vendor_price
    );
    if !prompt.confirm(&confirmation) {
        return Ok(false);
    }

    match webhooks.send_offer(&payload).await {
        Ok(()) => {
            info!("Offer sent for match {}", payload.match_id);
            prompt.alert(&format!(
                "Offer Sent Successfully!\n\nCustomer: {}\nOffer Price: ₹{}\nSent to: {}",
                match_data.customer_name, offer_price, match_data.customer_whatsapp
            ));
            Ok(true)
        }
        Err(e) => {
            error!("Offer for match {} failed: {}", payload.match_id, e);
            prompt.alert(OFFER_FAILED);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchingRequestGroup;
    use crate::service::notice::{NoticeKind, Notices};
    use crate::test_support::FakeWebhooks;
    use serde_json::json;

    fn modal(whatsapp: Option<&str>) -> (MatchData, ResponseView) {
        let group = MatchingRequestGroup::from_request(
            json!({
                "matchId": "M7",
                "customerName": "Acme",
                "customerEmail": "buyer@acme.test",
                "customerNumber": whatsapp,
                "product_req": "Copper wire",
                "qty": 40,
                "products": [{"Id": 3, "Potential_Buyer_1": "Wirecorp", "Vendor_Price": 95, "Quantity": 60}]
            })
            .as_object()
            .unwrap(),
        );
        let entry = &group.vendors[0];
        (MatchData::from_entry(entry), entry.response.clone())
    }

    #[test]
    fn price_must_be_positive_decimal() {
        assert!(parse_offer_price("120.50").is_some());
        assert!(parse_offer_price(" 7 ").is_some());
        assert!(parse_offer_price("0").is_none());
        assert!(parse_offer_price("-3").is_none());
        assert!(parse_offer_price("abc").is_none());
        assert!(parse_offer_price("").is_none());
    }

    #[tokio::test]
    async fn confirmed_offer_is_posted() {
        let hooks = FakeWebhooks::new();
        let (data, response) = modal(Some("+91 90000"));
        let notices = Notices::new(true);

        assert!(send_offer(&hooks, &data, &response, "110", &notices).await.unwrap());
        let offer = hooks.offers.lock()[0].clone();
        assert_eq!(offer.match_id, "M7");
        assert_eq!(offer.vendor_price, "95");
        assert_eq!(offer.offer_price, "110");
        assert_eq!(offer.available_qty, "60");
        assert_eq!(offer.can_deliver, "YES");
        assert_eq!(offer.quantity, "40");

        let seen = notices.into_vec();
        assert_eq!(seen[0].kind, NoticeKind::Confirm);
        assert_eq!(
            seen[0].text,
            "Send offer to customer?\n\nCustomer: Acme\nProduct: Copper wire\nOffer Price: ₹110\nVendor Price: ₹95"
        );
        assert!(seen[1].text.starts_with("Offer Sent Successfully!"));
    }

    #[tokio::test]
    async fn validation_happens_before_confirmation() {
        let hooks = FakeWebhooks::new();
        let (data, response) = modal(Some("+91 90000"));
        let notices = Notices::new(true);
        assert!(send_offer(&hooks, &data, &response, "0", &notices).await.is_err());

        let (data, response) = modal(None);
        assert!(send_offer(&hooks, &data, &response, "10", &notices).await.is_err());

        let seen = notices.into_vec();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].text, INVALID_PRICE);
        assert_eq!(seen[1].text, WHATSAPP_MISSING);
        assert!(hooks.offers.lock().is_empty());
    }

    #[tokio::test]
    async fn webhook_failure_alerts() {
        let hooks = FakeWebhooks::new();
        *hooks.fail_offers.lock() = true;
        let (data, response) = modal(Some("555"));
        let notices = Notices::new(true);

        assert!(send_offer(&hooks, &data, &response, "10", &notices).await.is_err());
        assert_eq!(notices.into_vec().last().unwrap().text, OFFER_FAILED);
    }

    #[tokio::test]
    async fn declined_offer_sends_nothing() {
        let hooks = FakeWebhooks::new();
        let (data, response) = modal(Some("555"));
        assert!(!send_offer(&hooks, &data, &response, "10", &Notices::new(false)).await.unwrap());
        assert!(hooks.offers.lock().is_empty());
    }
}
