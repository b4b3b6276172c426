use crate::{
    config::PricingPolicy,
    error::{AppError, AppResult},
};

/// Highest unit price accepted for a product or variant, in minor units (999,999.99).
pub const MAX_PRICE: i64 = 99_999_999;

pub fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if price > MAX_PRICE {
        return Err(AppError::BadRequest(format!(
            "price must not exceed {MAX_PRICE}"
        )));
    }
    Ok(())
}

fn too_large() -> AppError {
    AppError::BadRequest("Order total is too large".into())
}

/// Pricing snapshot stored on an order; never recomputed from the items afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPricing {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping_cost: i64,
    pub discount: i64,
    pub total_amount: i64,
}

/// Tax rounds half up to the nearest minor unit. No promotion engine, so discount is 0.
/// Amounts that overflow are a `BadRequest`.
pub fn quote(subtotal: i64, policy: &PricingPolicy) -> AppResult<OrderPricing> {
    let tax = subtotal
        .checked_mul(policy.tax_rate_bps)
        .and_then(|t| t.checked_add(5_000))
        .ok_or_else(too_large)?
        / 10_000;
    let shipping_cost = if subtotal > 0 {
        policy.shipping_flat_fee
    } else {
        0
    };
    let discount = 0;

    let total_amount = subtotal
        .checked_add(tax)
        .and_then(|t| t.checked_add(shipping_cost))
        .and_then(|t| t.checked_sub(discount))
        .ok_or_else(too_large)?;

    Ok(OrderPricing {
        subtotal,
        tax,
        shipping_cost,
        discount,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_percent_tax_and_flat_shipping() {
        let pricing = quote(3_000, &PricingPolicy::default()).unwrap();
        assert_eq!(
            pricing,
            OrderPricing {
                subtotal: 3_000,
                tax: 300,
                shipping_cost: 500,
                discount: 0,
                total_amount: 3_800,
            }
        );
    }

    #[test]
    fn empty_subtotal_ships_free() {
        let pricing = quote(0, &PricingPolicy::default()).unwrap();
        assert_eq!(pricing.shipping_cost, 0);
        assert_eq!(pricing.total_amount, 0);
    }

    #[test]
    fn tax_rounds_half_up() {
        let policy = PricingPolicy::default();
        assert_eq!(quote(1_005, &policy).unwrap().tax, 101);
        assert_eq!(quote(1_004, &policy).unwrap().tax, 100);
    }

    #[test]
    fn total_is_sum_of_parts() {
        let policy = PricingPolicy {
            tax_rate_bps: 825,
            shipping_flat_fee: 799,
        };
        let p = quote(12_345, &policy).unwrap();
        assert_eq!(p.total_amount, p.subtotal + p.tax + p.shipping_cost - p.discount);
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        let err = quote(i64::MAX / 2, &PricingPolicy::default()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn price_bounds() {
        assert!(validate_price(0).is_ok());
        assert!(validate_price(MAX_PRICE).is_ok());
        assert!(validate_price(MAX_PRICE + 1).is_err());
        assert!(validate_price(-1).is_err());
    }
}
