// pooled - generic, thread-safe connection pool
// See demos/ for fuller usage examples: cargo run --example basic

use pooled::{ConnectionFactory, ConnectionPool, FactoryError, PoolConfig};

struct DemoFactory;

impl ConnectionFactory for DemoFactory {
    type Connection = String;

    fn connect(&self) -> Result<String, FactoryError> {
        Ok(String::from("demo-client"))
    }

    fn disconnect(&self, _conn: &String) {}
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== pooled ===");
    println!("See demos/ for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let pool = ConnectionPool::new(DemoFactory, PoolConfig::default());

    match pool.checkout() {
        Ok(conn) => {
            println!("  Got connection: {}", *conn);
            pool.checkin(&conn);
        }
        Err(err) => println!("  Checkout failed: {err}"),
    }

    println!("  Idle after checkin: {}", pool.idle_count());
}
