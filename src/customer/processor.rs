use crate::core::item::{ItemProcessor, ItemProcessorResult};

use super::model::Customer;

/// Keeps the customers living in one country.
///
/// The comparison is exact: case and surrounding text matter. Customers from
/// any other country are filtered out, which is not an error.
pub struct CountryFilterProcessor {
    target_country: String,
}

impl CountryFilterProcessor {
    pub fn new(target_country: &str) -> Self {
        Self {
            target_country: target_country.to_string(),
        }
    }
}

impl ItemProcessor<Customer, Customer> for CountryFilterProcessor {
    fn process(&self, item: &Customer) -> ItemProcessorResult<Customer> {
        if item.country == self.target_country {
            Ok(Some(item.clone()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer_from(country: &str) -> Customer {
        Customer {
            id: 1,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            gender: "Female".to_string(),
            contact_no: "555-0100".to_string(),
            country: country.to_string(),
            dob: "1815-12-10".to_string(),
        }
    }

    #[test]
    fn exact_match_passes_unchanged() {
        let processor = CountryFilterProcessor::new("United States");
        let customer = customer_from("United States");

        assert_eq!(processor.process(&customer).unwrap(), Some(customer));
    }

    #[test]
    fn other_countries_are_filtered() {
        let processor = CountryFilterProcessor::new("United States");

        for country in ["Canada", "", "united states", "UNITED STATES", "United States of America"] {
            assert_eq!(
                processor.process(&customer_from(country)).unwrap(),
                None,
                "country {:?} should be filtered",
                country
            );
        }
    }
}
