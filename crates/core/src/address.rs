//! Shipping address collection and validation.
//!
//! Checkout accepts a loosely-filled [`ShippingAddressInput`] from the
//! details form and only proceeds once it converts into a complete
//! [`ShippingAddress`].

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::customer::PostalAddress;
use crate::types::{Email, EmailError};

/// A required field of the shipping form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressField {
    Name,
    Email,
    Mobile,
    Street,
    City,
    PostalCode,
    Country,
}

impl AddressField {
    /// Form field name as submitted by the client.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Mobile => "mobile",
            Self::Street => "street",
            Self::City => "city",
            Self::PostalCode => "postalCode",
            Self::Country => "country",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a submitted address cannot be used.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// One or more required fields are missing or blank.
    #[error("missing required shipping fields: {}", join_fields(.0))]
    Missing(Vec<AddressField>),
    /// The email field is present but malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl AddressError {
    /// Fields the user has to correct.
    #[must_use]
    pub fn fields(&self) -> Vec<AddressField> {
        match self {
            Self::Missing(fields) => fields.clone(),
            Self::InvalidEmail(_) => vec![AddressField::Email],
        }
    }
}

fn join_fields(fields: &[AddressField]) -> String {
    fields
        .iter()
        .map(AddressField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw shipping details as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// A complete destination address with contact details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: String,
    pub email: Email,
    pub mobile: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// The postal part of the address, without contact details.
    #[must_use]
    pub fn postal(&self) -> PostalAddress {
        PostalAddress {
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.clone().unwrap_or_default(),
            postal_code: self.postal_code.clone(),
            country: self.country.clone(),
        }
    }

    /// First word of the name, and everything after it.
    #[must_use]
    pub fn split_name(&self) -> (&str, &str) {
        self.name
            .split_once(' ')
            .map_or((self.name.as_str(), ""), |(first, rest)| (first, rest.trim()))
    }
}

impl TryFrom<ShippingAddressInput> for ShippingAddress {
    type Error = AddressError;

    fn try_from(input: ShippingAddressInput) -> Result<Self, Self::Error> {
        let mut missing = Vec::new();
        let mut required = |value: Option<String>, field: AddressField| {
            let value = value.map(|v| v.trim().to_owned()).unwrap_or_default();
            if value.is_empty() {
                missing.push(field);
            }
            value
        };

        let name = required(input.name, AddressField::Name);
        let email = required(input.email, AddressField::Email);
        let mobile = required(input.mobile, AddressField::Mobile);
        let street = required(input.street, AddressField::Street);
        let city = required(input.city, AddressField::City);
        let postal_code = required(input.postal_code, AddressField::PostalCode);
        let country = required(input.country, AddressField::Country);

        if !missing.is_empty() {
            return Err(AddressError::Missing(missing));
        }

        Ok(Self {
            name,
            email: Email::parse(&email)?,
            mobile,
            street,
            city,
            state: input
                .state
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            postal_code,
            country,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete_input() -> ShippingAddressInput {
        ShippingAddressInput {
            name: Some("Ayesha Khan".to_string()),
            email: Some("ayesha@example.pk".to_string()),
            mobile: Some("0300-1111111".to_string()),
            street: Some("12 Zamzama Blvd".to_string()),
            city: Some("Karachi".to_string()),
            state: None,
            postal_code: Some("75600".to_string()),
            country: Some("PK".to_string()),
        }
    }

    #[test]
    fn test_complete_input_converts() {
        let address = ShippingAddress::try_from(complete_input()).unwrap();
        assert_eq!(address.city, "Karachi");
        assert_eq!(address.state, None);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let input = ShippingAddressInput {
            mobile: Some("   ".to_string()),
            city: None,
            ..complete_input()
        };
        let err = ShippingAddress::try_from(input).unwrap_err();
        assert_eq!(
            err,
            AddressError::Missing(vec![AddressField::Mobile, AddressField::City])
        );
        assert_eq!(
            err.to_string(),
            "missing required shipping fields: mobile, city"
        );
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let input = ShippingAddressInput {
            email: Some("not-an-email".to_string()),
            ..complete_input()
        };
        let err = ShippingAddress::try_from(input).unwrap_err();
        assert_eq!(err.fields(), vec![AddressField::Email]);
    }

    #[test]
    fn test_blank_state_becomes_none() {
        let input = ShippingAddressInput {
            state: Some("  ".to_string()),
            ..complete_input()
        };
        assert_eq!(ShippingAddress::try_from(input).unwrap().state, None);
    }

    #[test]
    fn test_split_name() {
        let address = ShippingAddress::try_from(complete_input()).unwrap();
        assert_eq!(address.split_name(), ("Ayesha", "Khan"));
    }
}
