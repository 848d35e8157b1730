use rust_decimal::Decimal;

/// Sales measures as read from the source row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measures {
    pub amount: Option<Decimal>,
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repaired {
    pub measures: Measures,
    pub amount_repaired: bool,
    pub price_derived: bool,
    /// `quantity × |price|` does not fit a decimal; the amount is left unknown
    pub overflowed: bool,
}

impl Measures {
    /// `quantity × |price|` when both are known and the product is representable
    pub fn expected_amount(&self) -> Option<Decimal> {
        match (self.quantity, self.price) {
            (Some(q), Some(p)) => Decimal::from(q).checked_mul(p.abs()),
            _ => None,
        }
    }

    fn overflows(&self) -> bool {
        self.quantity.is_some() && self.price.is_some() && self.expected_amount().is_none()
    }

    /// Amount and price repair.
    ///
    /// An amount that is missing, non-positive, or disagrees with
    /// `quantity × |price|` is recomputed from them. A price that is missing or
    /// non-positive is derived from the (repaired) amount over quantity. When a
    /// repair's inputs are unknown, or quantity is zero, the result is unknown.
    /// A product too large for a decimal makes the amount unknown.
    pub fn repair(self) -> Repaired {
        let expected = self.expected_amount();
        let overflowed = self.overflows();
        let amount_bad = overflowed || match self.amount {
            None => true,
            Some(a) if a <= Decimal::ZERO => true,
            Some(a) => expected.map_or(false, |e| a != e),
        };
        let amount = if amount_bad { expected } else { self.amount };

        let price_bad = self.price.map_or(true, |p| p <= Decimal::ZERO);
        let price = if price_bad {
            match (amount, self.quantity) {
                (Some(a), Some(q)) if q != 0 => a.checked_div(Decimal::from(q)).map(|p| p.normalize()),
                _ => None,
            }
        } else {
            self.price
        };

        Repaired {
            measures: Measures {
                amount: amount.map(|a| a.normalize()),
                quantity: self.quantity,
                price,
            },
            amount_repaired: amount_bad,
            price_derived: price_bad,
            overflowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Option<Decimal> {
        Some(Decimal::from(v))
    }

    #[test]
    fn test_missing_amount_recomputed_from_absolute_price() {
        let out = Measures { amount: None, quantity: Some(3), price: dec(-10) }.repair();
        assert_eq!(out.measures.amount, dec(30));
        assert_eq!(out.measures.price, dec(10));
        assert!(out.amount_repaired);
        assert!(out.price_derived);
    }

    #[test]
    fn test_zero_quantity_price_is_unknown() {
        let out = Measures { amount: dec(50), quantity: Some(0), price: None }.repair();
        assert_eq!(out.measures.price, None);
        assert_eq!(out.measures.amount, dec(50));
        assert!(!out.amount_repaired);
    }

    #[test]
    fn test_inconsistent_amount_is_recomputed() {
        let out = Measures { amount: dec(100), quantity: Some(2), price: dec(40) }.repair();
        assert_eq!(out.measures.amount, dec(80));
        assert_eq!(out.measures.price, dec(40));
        assert!(!out.price_derived);
    }

    #[test]
    fn test_consistent_row_is_untouched() {
        let input = Measures { amount: dec(25), quantity: Some(1), price: dec(25) };
        let out = input.repair();
        assert_eq!(out.measures, input);
        assert!(!out.amount_repaired && !out.price_derived);
    }

    #[test]
    fn test_missing_price_derived_from_amount() {
        let out = Measures { amount: dec(90), quantity: Some(2), price: None }.repair();
        assert_eq!(out.measures.price, dec(45));
        assert_eq!(out.measures.amount, dec(90));
    }

    #[test]
    fn test_negative_amount_without_price_is_unknown() {
        let out = Measures { amount: dec(-5), quantity: Some(1), price: None }.repair();
        assert_eq!(out.measures.amount, None);
        assert_eq!(out.measures.price, None);
    }

    #[test]
    fn test_overflowing_product_degrades_to_unknown() {
        let input = Measures {
            amount: dec(5),
            quantity: Some(9_000_000_000_000_000_000),
            price: dec(100_000_000_000),
        };
        assert_eq!(input.expected_amount(), None);

        let out = input.repair();
        assert!(out.overflowed);
        assert_eq!(out.measures.amount, None);
        assert_eq!(out.measures.price, dec(100_000_000_000));
        assert!(!out.price_derived);
    }

    #[test]
    fn test_extreme_but_representable_product_is_kept() {
        let out = Measures { amount: None, quantity: Some(i64::MAX), price: dec(2) }.repair();
        assert!(!out.overflowed);
        assert_eq!(out.measures.amount, Some(Decimal::from(i64::MAX) * Decimal::from(2)));
    }
}
