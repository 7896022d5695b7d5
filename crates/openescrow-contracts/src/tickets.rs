//! Ticket sale: bag-valued inventory sold for a fungible price.
//!
//! The contract mints its whole inventory at start as one bag amount held
//! in an inventory seat. A buyer gives `Price` and wants a `Tickets` bag;
//! the trade charges the bag's price, hands over the tickets and refunds
//! any overpayment when the buyer's seat exits. Proceeds stay in the
//! inventory seat.

use std::collections::BTreeMap;

use openescrow_engine::{ContractHost, Invitation, Payout, TransferPart};
use openescrow_types::{
    Amount, AmountMap, AssetKind, Brand, EscrowError, ExitShape, Proposal, ProposalShape, Result,
    SeatId, Shape, TicketInventoryConfig, amounts, constants,
};

use crate::issuers::IssuerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketHandler {
    Buy,
}

/// Price of every ticket in `bag` at `prices` (label → unit price).
///
/// # Errors
/// `InvalidAmount` for a label with no price or a non-bag `bag`,
/// `AmountOverflow` if the total does not fit.
pub fn bag_price(bag: &Amount, prices: &BTreeMap<String, Amount>, price_brand: &Brand) -> Result<Amount> {
    let labels = bag.as_bag().ok_or_else(|| EscrowError::InvalidAmount {
        reason: format!("{bag} is not a bag"),
    })?;
    let mut total = Amount::empty(price_brand);
    for (label, count) in labels {
        let unit = prices.get(label).ok_or_else(|| EscrowError::InvalidAmount {
            reason: format!("no ticket kind {label}"),
        })?;
        let unit_value = unit.as_nat().ok_or_else(|| EscrowError::InvalidAmount {
            reason: format!("price of {label} is not fungible"),
        })?;
        let line = unit_value
            .checked_mul(u128::from(*count))
            .ok_or(EscrowError::AmountOverflow)?;
        total = total.add(&Amount::nat(price_brand, line)?)?;
    }
    Ok(total)
}

#[derive(Debug)]
pub struct TicketSale {
    host: ContractHost<TicketHandler>,
    ticket_brand: Brand,
    price_brand: Brand,
    prices: BTreeMap<String, Amount>,
    inventory_seat: SeatId,
}

impl TicketSale {
    /// Start a sale. The `Ticket` brand is issued here and registered with
    /// `issuers`.
    pub fn start(config: &TicketInventoryConfig, issuers: &mut IssuerRegistry) -> Result<Self> {
        if config.kinds.is_empty() {
            return Err(EscrowError::Configuration("ticket inventory is empty".to_string()));
        }
        let price_brand = issuers.resolve(&config.price_brand)?;
        let ticket_brand = Brand::issue("Ticket", AssetKind::Bag, 0);
        issuers.register(ticket_brand.clone())?;

        let mut prices = BTreeMap::new();
        for kind in &config.kinds {
            prices.insert(kind.name.clone(), Amount::from_display(&price_brand, kind.price)?);
        }
        let stock = Amount::bag(
            &ticket_brand,
            config.kinds.iter().map(|k| (k.name.as_str(), k.supply)),
        )?;

        let mut host = ContractHost::new();
        let inventory_seat =
            host.make_funded_seat(amounts([(constants::TICKETS_KEYWORD, stock.clone())]))?;
        tracing::info!(instance = %host.instance(), inventory = %stock, "ticket sale started");
        Ok(Self {
            host,
            ticket_brand,
            price_brand,
            prices,
            inventory_seat,
        })
    }

    #[must_use]
    pub fn ticket_brand(&self) -> &Brand {
        &self.ticket_brand
    }

    #[must_use]
    pub fn prices(&self) -> &BTreeMap<String, Amount> {
        &self.prices
    }

    pub fn make_trade_invitation(&mut self) -> Result<Invitation> {
        let shape = ProposalShape {
            give: Shape::exact_record([(
                constants::PRICE_KEYWORD.to_string(),
                Shape::BrandOf(self.price_brand.clone()),
            )]),
            want: Shape::exact_record([(
                constants::TICKETS_KEYWORD.to_string(),
                Shape::BrandOf(self.ticket_brand.clone()),
            )]),
            exit: ExitShape::Any,
        };
        self.host.make_invitation(
            constants::BUY_TICKETS_DESC,
            TicketHandler::Buy,
            Some(shape),
            None,
        )
    }

    /// Buy the tickets `proposal` wants. On success the buyer's seat exits
    /// holding the tickets and any change.
    ///
    /// # Errors
    /// `PaymentMismatch` if the payment is below the bag price,
    /// `InsufficientFunds` if the inventory cannot cover the bag; in both
    /// cases the buyer's seat fails and the payment is refunded.
    pub fn offer(&mut self, invitation: &Invitation, proposal: Proposal, payments: AmountMap) -> Result<Payout> {
        let offer = self.host.offer(invitation, proposal, payments)?;
        match offer.handler {
            TicketHandler::Buy => self.trade(offer.seat),
        }
    }

    fn trade(&mut self, buyer: SeatId) -> Result<Payout> {
        let proposal = self.host.seat(buyer)?.proposal.clone();
        let (Some(paid), Some(wanted)) = (
            proposal.give.get(constants::PRICE_KEYWORD),
            proposal.want.get(constants::TICKETS_KEYWORD),
        ) else {
            let err = EscrowError::ShapeMismatch {
                reason: "trade needs Price and Tickets".to_string(),
            };
            self.host.fail_seat(buyer, err.to_string())?;
            return Err(err);
        };

        let checked = bag_price(wanted, &self.prices, &self.price_brand).and_then(|total| {
            if paid.is_gte(&total)? {
                Ok(total)
            } else {
                Err(EscrowError::PaymentMismatch {
                    reason: format!("paid {paid}, tickets cost {total}"),
                })
            }
        });
        let total = match checked {
            Ok(total) => total,
            Err(err) => {
                self.host.fail_seat(buyer, err.to_string())?;
                return Err(err);
            }
        };

        let legs = [
            TransferPart::new(
                buyer,
                self.inventory_seat,
                amounts([(constants::PRICE_KEYWORD, total)]),
            ),
            TransferPart::new(
                self.inventory_seat,
                buyer,
                amounts([(constants::TICKETS_KEYWORD, wanted.clone())]),
            ),
        ];
        if let Err(err) = self.host.rearrange(&legs) {
            if !err.is_fatal() {
                self.host.fail_seat(buyer, err.to_string())?;
            }
            return Err(err);
        }
        let payout = self.host.exit_seat(buyer)?;
        tracing::info!(instance = %self.host.instance(), seat = %buyer, tickets = %wanted, "tickets sold");
        Ok(payout)
    }

    /// Tickets not yet sold.
    pub fn remaining(&self) -> Result<Amount> {
        Ok(self
            .host
            .allocation(self.inventory_seat)?
            .get(constants::TICKETS_KEYWORD)
            .cloned()
            .unwrap_or_else(|| Amount::empty(&self.ticket_brand)))
    }

    /// Full conservation audit of the instance's seats.
    pub fn audit(&mut self) -> Result<()> {
        self.host.verify_conservation()
    }

    /// Proceeds collected so far.
    pub fn proceeds(&self) -> Result<Amount> {
        Ok(self
            .host
            .allocation(self.inventory_seat)?
            .get(constants::PRICE_KEYWORD)
            .cloned()
            .unwrap_or_else(|| Amount::empty(&self.price_brand)))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn bag_price_sums_labels() {
        let money = Brand::dummy_nat("PlayMoney");
        let tickets = Brand::dummy_bag("Ticket");
        let prices: BTreeMap<String, Amount> = [
            ("frontRow".to_string(), Amount::nat(&money, 3).unwrap()),
            ("middleRow".to_string(), Amount::nat(&money, 2).unwrap()),
            ("lastRow".to_string(), Amount::nat(&money, 1).unwrap()),
        ]
        .into();
        let bag = Amount::bag(&tickets, [("frontRow", 3), ("middleRow", 2), ("lastRow", 1)]).unwrap();
        assert_eq!(bag_price(&bag, &prices, &money).unwrap().as_nat(), Some(14));
    }

    #[test]
    fn bag_price_unknown_label() {
        let money = Brand::dummy_nat("PlayMoney");
        let tickets = Brand::dummy_bag("Ticket");
        let bag = Amount::bag(&tickets, [("balcony", 1)]).unwrap();
        assert!(matches!(
            bag_price(&bag, &BTreeMap::new(), &money),
            Err(EscrowError::InvalidAmount { .. })
        ));
        let not_bag = Amount::nat(&money, 1).unwrap();
        assert!(bag_price(&not_bag, &BTreeMap::new(), &money).is_err());
    }

    #[test]
    fn start_rejects_empty_inventory() {
        let mut issuers = IssuerRegistry::with_brands([Brand::dummy_nat("PlayMoney")]).unwrap();
        let config = TicketInventoryConfig {
            price_brand: "PlayMoney".into(),
            kinds: Vec::new(),
        };
        assert!(TicketSale::start(&config, &mut issuers).is_err());
    }

    #[test]
    fn start_requires_known_price_brand() {
        let mut issuers = IssuerRegistry::new();
        let config = TicketInventoryConfig {
            price_brand: "PlayMoney".into(),
            kinds: vec![openescrow_types::TicketKindConfig {
                name: "frontRow".into(),
                price: Decimal::ONE,
                supply: 1,
            }],
        };
        assert!(matches!(
            TicketSale::start(&config, &mut issuers),
            Err(EscrowError::UnknownIssuer(_))
        ));
    }
}
