use sqlx::{Pool, QueryBuilder, Sqlite};
use tokio::runtime::Handle;

use crate::core::item::{ItemWriter, ItemWriterResult};
use crate::item::rdbc::DatabaseItemBinder;
use crate::BatchError;

// SQLite accepts at most 32766 bound parameters per statement.
const BIND_LIMIT: usize = 32766;

/// A writer upserting items into a SQLite table using SQLx.
///
/// Every call to [`ItemWriter::write`] is one unit of work: the chunk is
/// written inside a single transaction with
/// `INSERT INTO .. VALUES .. ON CONFLICT (key) DO UPDATE SET ..`, so rows whose
/// key already exists are updated in place. When any statement fails the
/// transaction is rolled back and no row of the chunk is persisted.
///
/// The writer is synchronous, like every `ItemWriter`, and drives the async
/// SQLx calls on the runtime `handle` it was built with. It may be called from
/// plain threads (for example the step's chunk workers) as well as from
/// runtime threads.
///
/// # Examples
///
/// ```no_run
/// use customer_batch::item::rdbc::sqlite_writer::SqliteItemWriter;
/// use customer_batch::item::rdbc::DatabaseItemBinder;
/// use customer_batch::core::item::ItemWriter;
/// use sqlx::{SqlitePool, query_builder::Separated, Sqlite};
///
/// #[derive(Clone)]
/// struct Product {
///     id: i32,
///     name: String,
/// }
///
/// struct ProductBinder;
/// impl DatabaseItemBinder<Product, Sqlite> for ProductBinder {
///     fn bind(&self, item: &Product, mut query_builder: Separated<Sqlite, &str>) {
///         query_builder.push_bind(item.id);
///         query_builder.push_bind(item.name.clone());
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite::memory:").await?;
/// let binder = ProductBinder;
///
/// let writer = SqliteItemWriter::<Product>::new(tokio::runtime::Handle::current())
///     .pool(&pool)
///     .table("products")
///     .add_column("id")
///     .add_column("name")
///     .conflict_key("id")
///     .item_binder(&binder);
///
/// writer.write(&[Product { id: 1, name: "Laptop".to_string() }])?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteItemWriter<'a, O> {
    handle: Handle,
    pool: Option<&'a Pool<Sqlite>>,
    table: Option<&'a str>,
    columns: Vec<&'a str>,
    conflict_key: Option<&'a str>,
    item_binder: Option<&'a (dyn DatabaseItemBinder<O, Sqlite> + Sync)>,
}

impl<'a, O> SqliteItemWriter<'a, O> {
    /// Creates a writer running its queries on `handle`.
    ///
    /// Pool, table, columns and item binder must be set before use.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            pool: None,
            table: None,
            columns: Vec::new(),
            conflict_key: None,
            item_binder: None,
        }
    }

    /// Sets the connection pool used by every chunk transaction.
    ///
    /// # Arguments
    ///
    /// * `pool` - The SQLite connection pool
    ///
    /// # Returns
    ///
    /// The updated `SqliteItemWriter` instance.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use customer_batch::item::rdbc::SqliteItemWriter;
    /// use sqlx::SqlitePool;
    /// use tokio::runtime::Handle;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = SqlitePool::connect("sqlite://customers.db?mode=rwc").await?;
    /// let writer = SqliteItemWriter::<String>::new(Handle::current()).pool(&pool);
    /// # Ok(())
    /// # }
    /// ```
    pub fn pool(mut self, pool: &'a Pool<Sqlite>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets the table the items are written to.
    ///
    /// # Arguments
    ///
    /// * `table` - Name of the target table, which must already exist
    ///
    /// # Returns
    ///
    /// The updated `SqliteItemWriter` instance.
    pub fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    /// Adds a column. Columns are bound in the order they are added.
    pub fn add_column(mut self, column: &'a str) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the column identifying a row. With a key, existing rows are
    /// updated; without one, a duplicate key fails the chunk.
    pub fn conflict_key(mut self, column: &'a str) -> Self {
        self.conflict_key = Some(column);
        self
    }

    /// Sets the binder pushing the values of an item, one per column.
    ///
    /// # Arguments
    ///
    /// * `item_binder` - Binds items in the order the columns were added
    ///
    /// # Returns
    ///
    /// The updated `SqliteItemWriter` instance.
    pub fn item_binder(
        mut self,
        item_binder: &'a (dyn DatabaseItemBinder<O, Sqlite> + Sync),
    ) -> Self {
        self.item_binder = Some(item_binder);
        self
    }

    fn configuration(
        &self,
    ) -> Result<(&'a Pool<Sqlite>, &'a str, &'a (dyn DatabaseItemBinder<O, Sqlite> + Sync)), BatchError>
    {
        match (self.pool, self.table, self.item_binder) {
            (Some(pool), Some(table), Some(binder)) if !self.columns.is_empty() => {
                Ok((pool, table, binder))
            }
            _ => Err(BatchError::ItemWriter(
                "SQLite writer requires a pool, a table, columns and an item binder".to_string(),
            )),
        }
    }

    /// Builds the upsert statement for one slice of items.
    fn build_query<'q>(
        &self,
        table: &str,
        binder: &(dyn DatabaseItemBinder<O, Sqlite> + Sync),
        items: &'q [O],
    ) -> QueryBuilder<'q, Sqlite> {
        let mut query_builder = QueryBuilder::new("INSERT INTO ");
        query_builder.push(table);
        query_builder.push(" (");
        query_builder.push(self.columns.join(","));
        query_builder.push(") ");

        query_builder.push_values(items, |b, item| {
            binder.bind(item, b);
        });

        if let Some(key) = self.conflict_key {
            let updates: Vec<String> = self
                .columns
                .iter()
                .filter(|column| **column != key)
                .map(|column| format!("{column} = excluded.{column}"))
                .collect();

            query_builder.push(format!(" ON CONFLICT ({key}) "));
            if updates.is_empty() {
                query_builder.push("DO NOTHING");
            } else {
                query_builder.push("DO UPDATE SET ");
                query_builder.push(updates.join(", "));
            }
        }

        query_builder
    }

    async fn write_in_transaction(
        &self,
        pool: &Pool<Sqlite>,
        table: &str,
        binder: &(dyn DatabaseItemBinder<O, Sqlite> + Sync),
        items: &[O],
    ) -> Result<(), sqlx::Error> {
        let mut transaction = pool.begin().await?;

        for slice in items.chunks(BIND_LIMIT / self.columns.len()) {
            let mut query_builder = self.build_query(table, binder, slice);
            query_builder.build().execute(&mut *transaction).await?;
        }

        // Dropping the transaction without commit rolls it back.
        transaction.commit().await
    }
}

impl<O> ItemWriter<O> for SqliteItemWriter<'_, O> {
    /// Writes a chunk in one transaction.
    ///
    /// # Errors
    /// `BatchError::ItemWriter` when the writer is not fully configured or
    /// when the database rejects the chunk (constraint violation, missing
    /// table, connection failure). Nothing from the chunk is persisted then.
    fn write(&self, items: &[O]) -> ItemWriterResult {
        if items.is_empty() {
            return Ok(());
        }

        let (pool, table, binder) = self.configuration()?;

        let result = tokio::task::block_in_place(|| {
            self.handle
                .block_on(self.write_in_transaction(pool, table, binder, items))
        });

        match result {
            Ok(()) => {
                log::debug!(
                    "Successfully wrote {} items to SQLite table {}",
                    items.len(),
                    table
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to write items to SQLite table {}: {}", table, e);
                Err(BatchError::ItemWriter(format!("SQLite write failed: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemWriter;
    use sqlx::{query_builder::Separated, sqlite::SqlitePoolOptions, Sqlite, SqlitePool};

    #[derive(Clone, Debug, PartialEq)]
    struct TestUser {
        id: i32,
        name: String,
        email: String,
    }

    struct TestUserBinder;
    impl DatabaseItemBinder<TestUser, Sqlite> for TestUserBinder {
        fn bind(&self, item: &TestUser, mut query_builder: Separated<Sqlite, &str>) {
            query_builder.push_bind(item.id);
            query_builder.push_bind(item.name.clone());
            query_builder.push_bind(item.email.clone());
        }
    }

    fn user(id: i32, name: &str, email: &str) -> TestUser {
        TestUser {
            id,
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    async fn setup_test_db() -> Result<SqlitePool, sqlx::Error> {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(pool)
    }

    async fn names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM users ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_new_creates_default_writer() {
        let writer = SqliteItemWriter::<TestUser>::new(Handle::current());

        assert!(writer.pool.is_none());
        assert!(writer.table.is_none());
        assert!(writer.columns.is_empty());
        assert!(writer.conflict_key.is_none());
        assert!(writer.item_binder.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_empty_items() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .item_binder(&binder);

        assert!(writer.write(&[]).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unconfigured_writer_fails() {
        let writer = SqliteItemWriter::<TestUser>::new(Handle::current()).table("users");

        let result = writer.write(&[user(1, "John Doe", "john@example.com")]);

        assert!(matches!(result, Err(BatchError::ItemWriter(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_multiple_items() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .conflict_key("id")
            .item_binder(&binder);

        let users = vec![
            user(1, "John Doe", "john@example.com"),
            user(2, "Jane Smith", "jane@example.com"),
            user(3, "Bob Johnson", "bob@example.com"),
        ];

        writer.write(&users).unwrap();

        assert_eq!(names(&pool).await, vec!["John Doe", "Jane Smith", "Bob Johnson"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_updates_existing_rows() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .conflict_key("id")
            .item_binder(&binder);

        writer
            .write(&[user(1, "John Doe", "john@example.com")])
            .unwrap();
        writer
            .write(&[
                user(1, "John Updated", "john.updated@example.com"),
                user(2, "Jane Smith", "jane@example.com"),
            ])
            .unwrap();

        assert_eq!(names(&pool).await, vec!["John Updated", "Jane Smith"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_chunk_is_rolled_back() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .conflict_key("id")
            .item_binder(&binder);

        writer
            .write(&[user(1, "John Doe", "john@example.com")])
            .unwrap();

        // Second row violates the UNIQUE constraint on email.
        let result = writer.write(&[
            user(2, "Jane Smith", "jane@example.com"),
            user(3, "Impostor", "john@example.com"),
        ]);

        if let Err(BatchError::ItemWriter(msg)) = result {
            assert!(msg.contains("SQLite write failed"));
        } else {
            panic!("Expected BatchError::ItemWriter");
        }

        assert_eq!(names(&pool).await, vec!["John Doe"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_without_key_rejects_duplicates() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .item_binder(&binder);

        writer
            .write(&[user(1, "John Doe", "john@example.com")])
            .unwrap();

        assert!(
            writer
                .write(&[user(1, "John Again", "again@example.com")])
                .is_err()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_large_batch_insert() {
        let pool = setup_test_db().await.unwrap();
        let binder = TestUserBinder;

        let writer = SqliteItemWriter::<TestUser>::new(Handle::current())
            .pool(&pool)
            .table("users")
            .add_column("id")
            .add_column("name")
            .add_column("email")
            .conflict_key("id")
            .item_binder(&binder);

        let users: Vec<TestUser> = (1..=12000)
            .map(|i| user(i, &format!("User {}", i), &format!("user{}@example.com", i)))
            .collect();

        writer.write(&users).unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 12000);
    }
}
