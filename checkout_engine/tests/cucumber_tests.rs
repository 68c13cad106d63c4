mod cucumber;

use ::cucumber::{codegen::LocalBoxFuture, event::ScenarioFinished, gherkin, writer, World};
use checkout_engine::test_utils::prepare_env::prepare_test_env;
use futures_util::FutureExt;
use log::*;
use tokio::runtime::Runtime;

use crate::cucumber::CheckoutWorld;

fn main() {
    prepare_test_env();
    let sys = Runtime::new().unwrap();
    sys.block_on(
        CheckoutWorld::cucumber()
            .with_writer(writer::Libtest::or_basic())
            .after(|_f, _r, scenario, ev, w| post_test_hook(scenario, ev, w))
            .run("tests/features"),
    );
    info!("🚀️ Tests complete");
}

fn post_test_hook<'a>(
    scenario: &'a gherkin::Scenario,
    ev: &'a ScenarioFinished,
    world: Option<&'a mut CheckoutWorld>,
) -> LocalBoxFuture<'a, ()> {
    let fut = async move {
        trace!("🚀️ After-scenario hook running for \"{}\"", scenario.name);
        match (ev, world) {
            (ScenarioFinished::StepFailed(_, _, _), Some(world)) => {
                error!("🚀️ Scenario \"{}\" failed. Final checkout state: {:?}", scenario.name, world.state().await);
                world.close().await;
            },
            (_, Some(world)) => world.close().await,
            (_, None) => warn!("🚀️ World was not specified. Nothing to clean up."),
        }
        trace!("🚀️ After-scenario hook complete");
    };
    fut.boxed_local()
}
