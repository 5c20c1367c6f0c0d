use serde::Deserialize;
use sqlx::{query_builder::Separated, Sqlite};

use crate::item::rdbc::DatabaseItemBinder;

/// Table holding the imported customers.
pub const CUSTOMER_TABLE: &str = "customers";

/// Columns of [`CUSTOMER_TABLE`], in the order [`CustomerBinder`] binds them.
pub const CUSTOMER_COLUMNS: [&str; 8] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "gender",
    "contact_no",
    "country",
    "dob",
];

/// One line of the customer file.
///
/// Fields are filled by position: `id, firstName, lastName, email, gender,
/// contactNo, country, dob`. The date of birth is kept as delivered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Customer {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub contact_no: String,
    pub country: String,
    pub dob: String,
}

/// Binds a [`Customer`] to the columns listed in [`CUSTOMER_COLUMNS`].
#[derive(Default)]
pub struct CustomerBinder;

impl DatabaseItemBinder<Customer, Sqlite> for CustomerBinder {
    fn bind(&self, item: &Customer, mut query_builder: Separated<Sqlite, &str>) {
        query_builder.push_bind(item.id);
        query_builder.push_bind(item.first_name.clone());
        query_builder.push_bind(item.last_name.clone());
        query_builder.push_bind(item.email.clone());
        query_builder.push_bind(item.gender.clone());
        query_builder.push_bind(item.contact_no.clone());
        query_builder.push_bind(item.country.clone());
        query_builder.push_bind(item.dob.clone());
    }
}
