/// Errors from price, total and quantity computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    /// Requested quantity is zero or negative.
    #[error("invalid quantity {quantity}: quantity must be a positive integer")]
    InvalidQuantity { quantity: i64 },

    /// Stock is managed and the request exceeds what is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A variation has no chosen option.
    #[error("no option selected for variation '{variation}'")]
    MissingSelection { variation: String },

    /// The chosen option is not one of the variation's options.
    #[error("'{option}' is not an option of variation '{variation}'")]
    UnknownOption { variation: String, option: String },

    /// The selection names a variation the item does not have.
    #[error("item has no variation named '{variation}'")]
    UnknownVariation { variation: String },

    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Decimal arithmetic left the representable range.
    #[error("arithmetic overflow: {message}")]
    Overflow { message: String },
}

impl PricingError {
    /// The blocking, user-actionable message for this error.
    pub fn user_message(&self) -> String {
        match self {
            PricingError::InvalidQuantity { .. } => {
                "Please choose a quantity of at least 1.".to_string()
            }
            PricingError::InsufficientStock { available, .. } => {
                format!("Only {available} left in stock. Please reduce the quantity.")
            }
            PricingError::MissingSelection { variation } => {
                format!("Please choose a {variation}.")
            }
            PricingError::UnknownOption { variation, .. }
            | PricingError::UnknownVariation { variation } => {
                format!("The selected {variation} is no longer available.")
            }
            PricingError::CurrencyMismatch { .. } | PricingError::Overflow { .. } => {
                "This product is misconfigured. Please contact the seller.".to_string()
            }
        }
    }
}

/// Errors converting a stored product row into a [`CatalogItem`](crate::CatalogItem).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("item '{item_id}': invalid {field} '{value}': expected YYYY-MM-DD or RFC 3339")]
    InvalidSaleDate {
        item_id: String,
        field: &'static str,
        value: String,
    },

    #[error("item '{item_id}': variation '{name}' appears more than once")]
    DuplicateVariation { item_id: String, name: String },

    #[error("item '{item_id}': variation '{name}' has no options")]
    EmptyVariation { item_id: String, name: String },

    #[error("item '{item_id}': currency code is empty")]
    MissingCurrency { item_id: String },
}
