mod trade;

use crate::trade::TradeWorld;
use cucumber::{writer, World};
use log::*;
use tokio::runtime::Runtime;

fn main() {
    env_logger::init();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        TradeWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .run_and_exit("tests/features/trade.feature"),
    );
    info!("Tests complete");
}
