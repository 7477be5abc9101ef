use apguard_core::{Action, RejectListConfig};
use apguard_host::replay;
use apguard_host::scenario::Script;
use apguard_host::settings::{Firmware, Logger, Settings};

fn sample_script() -> Script {
    Script::load(concat!(env!("CARGO_MANIFEST_DIR"), "/../configs/scenario.toml")).unwrap()
}

#[tokio::test]
async fn test_sample_scenario_replays() {
    let settings = Settings {
        logger: Logger {
            level: "info".into(),
        },
        reject_list: RejectListConfig::default(),
        firmware: Firmware { queue_depth: 32 },
        scenario: None,
    };

    let report = replay(&settings, &sample_script()).await.unwrap();

    let actions: Vec<Action> = report.decisions.iter().map(|(_, action)| *action).collect();
    assert_eq!(
        actions,
        vec![
            Action::Reject,
            Action::ForceRemove,
            Action::Allow,
            Action::Allow,
        ]
    );
    assert_eq!(report.refused, 0);
    // The user blacklist and the escalated AP remain.
    assert_eq!(report.remaining, 2);
    assert_eq!(report.firmware.malformed, 0);
    // Queries age the table without re-exporting it.
    assert_eq!(report.firmware.current.len(), 4);
}
