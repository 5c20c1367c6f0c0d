//! Mock version of the customer writer;
use mockall::mock;

use customer_batch::{
    core::item::{ItemWriter, ItemWriterResult},
    customer::Customer,
};

mock! {
    pub CustomerWriter {}
    impl ItemWriter<Customer> for CustomerWriter {
        fn write(&self, items: &[Customer]) -> ItemWriterResult;
    }
}
