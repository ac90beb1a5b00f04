//! Behavioural tests covering dispatch and the helper lifecycle end to end.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use fulltrust_envelope::SUCCESS_KEY;

use crate::lifecycle::{HelperOutcome, LaunchMode, LifecycleState};
use crate::tests::support::{HandlerEvent, HelperWorld, RelaunchBehaviour};

type StepResult = Result<(), String>;

#[fixture]
fn world() -> RefCell<HelperWorld> {
    RefCell::new(HelperWorld::new())
}

/// Strips surrounding double quotes and restores the JSON quotes written as
/// single quotes in feature files.
fn wire_text(s: &str) -> String {
    s.trim_matches('"').replace('\'', "\"")
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

#[given("a helper")]
fn given_helper(world: &RefCell<HelperWorld>) {
    let _ = world;
}

#[given("the helper runs elevated")]
fn given_elevated(world: &RefCell<HelperWorld>) {
    world.borrow_mut().services.elevated = true;
}

#[given("relaunching is declined by the user")]
fn given_declined(world: &RefCell<HelperWorld>) {
    world.borrow_mut().services.relaunch = RelaunchBehaviour::Decline;
}

#[given("relaunching fails")]
fn given_relaunch_fails(world: &RefCell<HelperWorld>) {
    world.borrow_mut().services.relaunch = RelaunchBehaviour::Fail;
}

#[given("the helper was relaunched by a waiting predecessor")]
fn given_relaunched(world: &RefCell<HelperWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    world.mode = LaunchMode::ElevatedRelaunch;
    world.await_handover()
}

#[given("a panicking handler is registered first")]
fn given_panicking_handler(world: &RefCell<HelperWorld>) {
    world.borrow_mut().services.panicking_handler = true;
}

#[given("the first handler refuses to initialise")]
fn given_refusing_handler(world: &RefCell<HelperWorld>) {
    world.borrow_mut().services.refusing_handler = true;
}

#[given("an accept timeout of {seconds} second")]
fn given_accept_timeout(world: &RefCell<HelperWorld>, seconds: u64) {
    world.borrow_mut().loader.set_accept_timeout_secs(seconds);
}

#[given("launch settings {text}")]
fn given_launch_settings(world: &RefCell<HelperWorld>, text: String) -> StepResult {
    world.borrow().write_launch_settings(&wire_text(&text))
}

#[when("the helper starts and the peer connects")]
fn when_started_and_connected(world: &RefCell<HelperWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    world.start()?;
    world.connect_peer()
}

#[when("the helper starts without a peer")]
fn when_started_alone(world: &RefCell<HelperWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    world.start()?;
    world.wait_for_stop()
}

#[when("the peer sends {message}")]
fn when_peer_sends(world: &RefCell<HelperWorld>, message: String) -> StepResult {
    world.borrow_mut().send(&[wire_text(&message)])
}

#[when("the peer pipelines {first} and {second}")]
fn when_peer_pipelines(
    world: &RefCell<HelperWorld>,
    first: String,
    second: String,
) -> StepResult {
    world
        .borrow_mut()
        .send(&[wire_text(&first), wire_text(&second)])
}

#[when("the peer waits for a reply")]
fn when_peer_waits(world: &RefCell<HelperWorld>) -> StepResult {
    world.borrow_mut().receive_reply()
}

#[when("the peer disconnects")]
fn when_peer_disconnects(world: &RefCell<HelperWorld>) -> StepResult {
    world.borrow_mut().disconnect_peer()
}

#[when("the helper receives signal {signal}")]
fn when_signalled(world: &RefCell<HelperWorld>, signal: i32) -> StepResult {
    world.borrow().signal_shutdown(signal)
}

#[then("the reply has Success {code}")]
fn then_reply_code(world: &RefCell<HelperWorld>, code: i64) -> StepResult {
    let world = world.borrow();
    let reply = world.last_reply.as_ref().ok_or("no reply recorded")?;
    let actual = reply.get(SUCCESS_KEY).and_then(|value| value.as_i64());
    if actual == Some(code) {
        Ok(())
    } else {
        Err(format!("expected Success {code}, got {reply:?}"))
    }
}

#[then("the reply carries request id {id}")]
fn then_reply_request_id(world: &RefCell<HelperWorld>, id: String) -> StepResult {
    let world = world.borrow();
    let reply = world.last_reply.as_ref().ok_or("no reply recorded")?;
    assert_eq!(reply.request_id(), Some(strip_quotes(&id)));
    Ok(())
}

#[then("the reply carries no request id")]
fn then_reply_without_request_id(world: &RefCell<HelperWorld>) -> StepResult {
    let world = world.borrow();
    let reply = world.last_reply.as_ref().ok_or("no reply recorded")?;
    assert!(reply.get("RequestID").is_none(), "unexpected id in {reply:?}");
    Ok(())
}

#[then("the helper stops because {reason}")]
fn then_stops_because(world: &RefCell<HelperWorld>, reason: String) -> StepResult {
    let mut world = world.borrow_mut();
    if world.outcome().is_err() {
        world.wait_for_stop()?;
    }
    let actual = world.stop_reason()?.to_string();
    let expected = strip_quotes(&reason);
    if actual.starts_with(expected) {
        Ok(())
    } else {
        Err(format!("expected shutdown because '{expected}', got '{actual}'"))
    }
}

#[then("the helper is still running")]
fn then_still_running(world: &RefCell<HelperWorld>) {
    assert!(world.borrow().is_running(), "helper should keep running");
}

#[then("no relaunch was attempted")]
fn then_no_relaunch(world: &RefCell<HelperWorld>) {
    assert_eq!(world.borrow().services.relaunches(), 0);
}

#[then("the peer received nothing before the connection closed")]
fn then_nothing_received(world: &RefCell<HelperWorld>) -> StepResult {
    let bytes = world.borrow_mut().bytes_until_closed()?;
    assert!(bytes.is_empty(), "unexpected bytes from helper: {bytes:?}");
    Ok(())
}

#[then("handler {name} saw commands {commands}")]
fn then_handler_saw(world: &RefCell<HelperWorld>, name: String, commands: String) -> StepResult {
    let world = world.borrow();
    let name = strip_quotes(&name);
    let expected: Vec<String> = strip_quotes(&commands)
        .split(',')
        .map(|command| command.trim().to_owned())
        .collect();
    world.wait_for(|world| world.services.commands_seen_by(name).len() >= expected.len())?;
    let seen = world.services.commands_seen_by(name);
    assert_eq!(seen, expected);
    Ok(())
}

#[then("handler {name} saw no commands")]
fn then_handler_saw_nothing(world: &RefCell<HelperWorld>, name: String) {
    let world = world.borrow();
    assert!(world.services.commands_seen_by(strip_quotes(&name)).is_empty());
}

#[then("the handlers were disposed in reverse order")]
fn then_disposed_in_reverse(world: &RefCell<HelperWorld>) {
    let disposals: Vec<HandlerEvent> = world
        .borrow()
        .services
        .events()
        .into_iter()
        .filter(|event| matches!(event, HandlerEvent::Disposed(_)))
        .collect();
    assert_eq!(
        disposals,
        vec![HandlerEvent::Disposed("second"), HandlerEvent::Disposed("first")]
    );
}

#[then("every handler finished {command} before any was disposed")]
fn then_finished_before_disposal(world: &RefCell<HelperWorld>, command: String) {
    let command = strip_quotes(&command);
    let events = world.borrow().services.events();
    let first_disposal = events
        .iter()
        .position(|event| matches!(event, HandlerEvent::Disposed(_)))
        .expect("handlers should have been disposed");
    let handled: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, event)| {
            matches!(event, HandlerEvent::Handled(_, seen) if seen.as_str() == command)
        })
        .map(|(index, _)| index)
        .collect();
    assert_eq!(handled.len(), 2, "both handlers should finish {command}: {events:?}");
    assert!(
        handled.iter().all(|index| *index < first_disposal),
        "disposal overtook a running handler: {events:?}"
    );
}

#[then("no handler was initialised")]
fn then_no_handler_initialised(world: &RefCell<HelperWorld>) {
    let initialised = world
        .borrow()
        .services
        .events()
        .into_iter()
        .any(|event| matches!(event, HandlerEvent::Initialized(_)));
    assert!(!initialised, "handlers must not be initialised");
}

#[then("the lifecycle skipped the running state")]
fn then_skipped_running(world: &RefCell<HelperWorld>) {
    assert_eq!(
        world.borrow().reporter.states(),
        vec![
            LifecycleState::Starting,
            LifecycleState::AcceptingConnection,
            LifecycleState::ShuttingDown,
            LifecycleState::Stopped,
        ]
    );
}

#[then("the predecessor heard from its successor")]
fn then_handover_announced(world: &RefCell<HelperWorld>) -> StepResult {
    assert!(world.borrow().handover_announced()?, "successor never announced itself");
    Ok(())
}

#[then("the endpoint has been removed")]
fn then_endpoint_removed(world: &RefCell<HelperWorld>) {
    assert!(!world.borrow().endpoint_exists(), "endpoint socket should be gone");
}

#[then("the helper handled the pending launch")]
fn then_pending_launch_handled(world: &RefCell<HelperWorld>) -> StepResult {
    let world = world.borrow();
    assert_eq!(world.outcome()?, &HelperOutcome::PendingLaunchHandled);
    Ok(())
}

#[then("the launch settings no longer carry a command")]
fn then_settings_consumed(world: &RefCell<HelperWorld>) -> StepResult {
    let settings = world.borrow().launch_settings()?;
    assert!(!settings.contains("Arguments"), "settings still pending: {settings}");
    assert!(settings.contains("Theme"), "other settings must survive: {settings}");
    Ok(())
}

#[scenario(path = "tests/features/helper_dispatch.feature")]
fn helper_dispatch(#[from(world)] world: RefCell<HelperWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/helper_lifecycle.feature")]
fn helper_lifecycle(#[from(world)] world: RefCell<HelperWorld>) {
    drop(world);
}
