use secrecy::SecretBox;
use serde_json::Value;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use ts3_deck::{
    AwayAction, AwayFeature, AwaySettings, Host, MuteAction, MuteFeature, MuteSettings, ObservedState,
    PollOutcome, Reconciler, ToggleOutcome,
};
use ts3_query::test_utils::{MockClientQuery, Reply};
use ts3_query::{MuteKind, QueryConfig, QueryDriver};

#[derive(Default)]
struct RecordingHost {
    states: Mutex<Vec<u8>>,
    settings: Mutex<Vec<Value>>,
}

impl RecordingHost {
    fn states(&self) -> Vec<u8> {
        self.states.lock().unwrap().clone()
    }
}

impl Host for RecordingHost {
    fn set_state(&self, state: u8) {
        self.states.lock().unwrap().push(state);
    }

    fn set_settings(&self, settings: Value) {
        self.settings.lock().unwrap().push(settings);
    }
}

type Vars = Arc<Mutex<HashMap<String, String>>>;

fn vars(initial: &[(&str, &str)]) -> Vars {
    Arc::new(Mutex::new(
        initial
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    ))
}

/// A client with clid=5 whose own variables live in `vars`
fn fake_client(vars: Vars) -> impl FnMut(&str) -> Reply + Send + 'static {
    move |command| {
        if command.starts_with("auth ") || command == "use" {
            return Reply::ok();
        }
        if command == "whoami" {
            return Reply::data("clid=5 cid=1");
        }
        if let Some(variable) = command.strip_prefix("clientvariable clid=5 ") {
            let value = vars
                .lock()
                .unwrap()
                .get(variable)
                .cloned()
                .unwrap_or_else(|| "0".to_string());
            return Reply::data(&format!("clid=5 {}={}", variable, value));
        }
        if let Some(update) = command.strip_prefix("clientupdate ") {
            if let Some((variable, value)) = update.split_once('=') {
                vars.lock()
                    .unwrap()
                    .insert(variable.to_string(), value.to_string());
                return Reply::ok();
            }
        }
        Reply::error(256, "command\\snot\\sfound")
    }
}

fn updates(mock: &MockClientQuery) -> Vec<String> {
    mock.commands()
        .into_iter()
        .filter(|c| c.starts_with("clientupdate "))
        .collect()
}

fn mute_action(mock: &MockClientQuery, host: &Arc<RecordingHost>) -> MuteAction {
    MuteAction::new(
        MuteFeature::new(MuteKind::Input),
        MuteSettings {
            api_key: "KEY".into(),
        },
        mock.config(),
        host.clone(),
    )
}

#[test_log::test]
fn test_poll_is_idempotent() {
    let remote = vars(&[("client_input_muted", "1")]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(true));
    assert_eq!(action.poll(), PollOutcome::Unchanged(true));
    assert_eq!(host.states(), vec![1, 1]);
    assert_eq!(action.observed(), ObservedState::Known(true));
    assert_eq!(mock.connections(), 1);
}

#[test_log::test]
fn test_poll_follows_remote_changes() {
    let remote = vars(&[("client_input_muted", "1")]);
    let mock = MockClientQuery::start(fake_client(remote.clone())).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(true));
    remote
        .lock()
        .unwrap()
        .insert("client_input_muted".into(), "0".into());
    assert_eq!(action.poll(), PollOutcome::Changed(false));
    assert_eq!(host.states(), vec![1, 0]);
}

#[test_log::test]
fn test_rejected_read_skips_without_ui_change() {
    let mock = MockClientQuery::start(|command| match command {
        c if c.starts_with("clientvariable") => Reply::error(1538, "invalid\\sparameter"),
        "whoami" => Reply::data("clid=5 cid=1"),
        _ => Reply::ok(),
    })
    .unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Skipped);
    assert!(host.states().is_empty());
    assert!(action.driver().is_connected());
    assert_eq!(mock.count("clientvariable clid=5 client_input_muted"), 10);
}

#[test_log::test]
fn test_missing_client_id_drops_connection() {
    let mock = MockClientQuery::start(|command| match command {
        "whoami" => Reply::error(1794, "not\\sconnected"),
        _ => Reply::ok(),
    })
    .unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Skipped);
    assert!(host.states().is_empty());
    assert!(!action.driver().is_connected());
}

#[test_log::test]
fn test_connection_loss_resets_image() {
    let mock = MockClientQuery::start(|command| match command {
        c if c.starts_with("clientvariable") => Reply::Hangup,
        "whoami" => Reply::data("clid=5 cid=1"),
        _ => Reply::ok(),
    })
    .unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Reset);
    assert_eq!(host.states(), vec![0]);
    assert_eq!(action.observed(), ObservedState::Unknown);
    assert!(!action.driver().is_connected());
}

#[test_log::test]
fn test_unreachable_client_is_offline() {
    let address = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let host = Arc::new(RecordingHost::default());
    let action = MuteAction::new(
        MuteFeature::new(MuteKind::Output),
        MuteSettings {
            api_key: "KEY".into(),
        },
        QueryConfig::with_address(address),
        host.clone(),
    );

    assert_eq!(action.poll(), PollOutcome::Offline);
    assert_eq!(action.press(None), ToggleOutcome::Offline);
    assert!(host.states().is_empty());
}

#[test_log::test]
fn test_toggle_flips_polled_state() {
    let remote = vars(&[("client_input_muted", "0")]);
    let mock = MockClientQuery::start(fake_client(remote.clone())).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(false));
    assert_eq!(action.press(None), ToggleOutcome::Applied(true));
    assert_eq!(updates(&mock), vec!["clientupdate client_input_muted=1"]);
    assert_eq!(host.states(), vec![0, 1]);

    assert_eq!(action.poll(), PollOutcome::Changed(true));
    assert_eq!(action.press(None), ToggleOutcome::Applied(false));
    assert_eq!(
        updates(&mock).last().map(String::as_str),
        Some("clientupdate client_input_muted=0")
    );
}

#[test_log::test]
fn test_repeated_presses_between_polls_alternate() {
    let remote = vars(&[("client_input_muted", "0")]);
    let mock = MockClientQuery::start(fake_client(remote.clone())).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(false));
    assert_eq!(action.press(None), ToggleOutcome::Applied(true));
    assert_eq!(action.press(None), ToggleOutcome::Applied(false));
    assert_eq!(
        updates(&mock),
        vec![
            "clientupdate client_input_muted=1",
            "clientupdate client_input_muted=0",
        ]
    );
    assert_eq!(
        remote.lock().unwrap().get("client_input_muted").map(String::as_str),
        Some("0")
    );
    // Presses leave the cache to the poll cycle
    assert_eq!(action.observed(), ObservedState::Known(false));
}

#[test_log::test]
fn test_press_flips_value_changed_in_client_since_poll() {
    let remote = vars(&[("client_input_muted", "0")]);
    let mock = MockClientQuery::start(fake_client(remote.clone())).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(false));
    remote
        .lock()
        .unwrap()
        .insert("client_input_muted".into(), "1".into());

    assert_eq!(action.press(None), ToggleOutcome::Applied(false));
    assert_eq!(updates(&mock), vec!["clientupdate client_input_muted=0"]);
}

#[test_log::test]
fn test_concurrent_polls_and_presses_share_one_session() {
    let remote = vars(&[("client_input_muted", "0")]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = Arc::new(mute_action(&mock, &host));
    const ROUNDS: usize = 10;

    let pollers: Vec<_> = (0..4)
        .map(|_| {
            let action = Arc::clone(&action);
            thread::spawn(move || (0..ROUNDS).map(|_| action.poll()).collect::<Vec<_>>())
        })
        .collect();
    let pressers: Vec<_> = (0..4)
        .map(|_| {
            let action = Arc::clone(&action);
            thread::spawn(move || (0..ROUNDS).map(|_| action.press(None)).collect::<Vec<_>>())
        })
        .collect();

    for poller in pollers {
        for outcome in poller.join().unwrap() {
            assert!(
                matches!(outcome, PollOutcome::Changed(_) | PollOutcome::Unchanged(_)),
                "unexpected poll outcome {outcome:?}"
            );
        }
    }
    for presser in pressers {
        for outcome in presser.join().unwrap() {
            assert!(
                matches!(outcome, ToggleOutcome::Applied(_)),
                "unexpected toggle outcome {outcome:?}"
            );
        }
    }

    // Every exchange got its own reply on the one socket
    assert_eq!(mock.connections(), 1);
    assert_eq!(mock.count("auth apikey=KEY"), 1);
    assert_eq!(mock.count("whoami"), 8 * ROUNDS);
    assert_eq!(mock.count("clientvariable clid=5 client_input_muted"), 8 * ROUNDS);
    assert_eq!(updates(&mock).len(), 4 * ROUNDS);
    assert!(action.driver().is_connected());
}

#[test_log::test]
fn test_toggle_reads_remote_before_first_poll() {
    let remote = vars(&[("client_input_muted", "1")]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.press(None), ToggleOutcome::Applied(false));
    assert_eq!(mock.count("clientvariable clid=5 client_input_muted"), 1);
    assert_eq!(updates(&mock), vec!["clientupdate client_input_muted=0"]);
}

#[test_log::test]
fn test_desired_state_skips_read() {
    let remote = vars(&[]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.press(Some(true)), ToggleOutcome::Applied(true));
    assert_eq!(mock.count("clientvariable clid=5 client_input_muted"), 0);
    assert_eq!(mock.count("whoami"), 0);
    assert_eq!(updates(&mock), vec!["clientupdate client_input_muted=1"]);
}

#[test_log::test]
fn test_failed_toggle_leaves_state_alone() {
    let mock = MockClientQuery::start(|command| match command {
        c if c.starts_with("clientupdate") => Reply::error(2568, "insufficient\\sclient\\spermissions"),
        c if c.starts_with("clientvariable") => Reply::data("clid=5 client_input_muted=0"),
        "whoami" => Reply::data("clid=5 cid=1"),
        _ => Reply::ok(),
    })
    .unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = mute_action(&mock, &host);

    assert_eq!(action.poll(), PollOutcome::Changed(false));
    assert_eq!(action.press(None), ToggleOutcome::Failed);
    assert_eq!(action.observed(), ObservedState::Known(false));
    assert_eq!(host.states(), vec![0]);
    assert!(action.driver().is_connected());
}

#[test_log::test]
fn test_going_away_mutes_and_sets_message() {
    let remote = vars(&[]);
    let mock = MockClientQuery::start(fake_client(remote.clone())).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = AwayAction::new(
        AwayFeature,
        AwaySettings {
            api_key: "KEY".into(),
            away_status_message: "Be right back".into(),
            ..AwaySettings::default()
        },
        mock.config(),
        host.clone(),
    );

    assert_eq!(action.poll(), PollOutcome::Changed(false));
    assert_eq!(action.press(None), ToggleOutcome::Applied(true));
    assert_eq!(
        updates(&mock),
        vec![
            "clientupdate client_input_muted=1",
            "clientupdate client_output_muted=1",
            "clientupdate client_away=1",
            "clientupdate client_away_message=Be\\sright\\sback",
        ]
    );

    assert_eq!(action.poll(), PollOutcome::Changed(true));
    assert_eq!(action.press(None), ToggleOutcome::Applied(false));
    assert_eq!(
        updates(&mock)[4..],
        [
            "clientupdate client_input_muted=0",
            "clientupdate client_output_muted=0",
            "clientupdate client_away=0",
        ]
    );
    assert_eq!(remote.lock().unwrap().get("client_away").map(String::as_str), Some("0"));
}

#[test_log::test]
fn test_away_can_leave_audio_alone() {
    let remote = vars(&[]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let host = Arc::new(RecordingHost::default());
    let action = AwayAction::new(
        AwayFeature,
        AwaySettings {
            api_key: "KEY".into(),
            mute_while_away: false,
            ..AwaySettings::default()
        },
        mock.config(),
        host.clone(),
    );

    assert_eq!(action.press(Some(true)), ToggleOutcome::Applied(true));
    assert_eq!(updates(&mock), vec!["clientupdate client_away=1"]);
}

#[test_log::test]
fn test_reconciler_on_shared_driver() {
    let remote = vars(&[("client_output_muted", "1")]);
    let mock = MockClientQuery::start(fake_client(remote)).unwrap();
    let driver = Arc::new(QueryDriver::new(
        mock.config(),
        SecretBox::new(Box::new("KEY".to_string())),
    ));
    let host = Arc::new(RecordingHost::default());
    let input = Reconciler::new(driver.clone(), host.clone());
    let output = Reconciler::new(driver.clone(), host.clone());
    let settings = MuteSettings::default();

    assert_eq!(
        input.poll(&MuteFeature::new(MuteKind::Input), &settings),
        PollOutcome::Changed(false)
    );
    assert_eq!(
        output.poll(&MuteFeature::new(MuteKind::Output), &settings),
        PollOutcome::Changed(true)
    );
    assert_eq!(host.states(), vec![0, 1]);
    assert_eq!(mock.connections(), 1);
}
