pub(crate) mod content;
pub(crate) mod pricing;
pub(crate) mod purchase;
