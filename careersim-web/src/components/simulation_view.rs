use careersim_progress::{CompletionReport, ProgressError};
use serde::Deserialize;
use yew::prelude::*;

use crate::components::task_stepper::TaskStepper;
use crate::dom;
use crate::hook::{SimulationProps, use_simulation_progress};

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    pub simulation: SimulationProps,
    #[prop_or_default]
    pub task_titles: Vec<AttrValue>,
    #[prop_or_default]
    pub on_all_completed: Callback<()>,
}

/// JSON accepted by `mount_simulation`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountOptions {
    pub simulation_id: String,
    pub attempt_id: String,
    pub total_task_count: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    pub api_base: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub task_titles: Vec<String>,
}

impl MountOptions {
    #[must_use]
    pub fn into_props(self) -> Props {
        Props {
            simulation: SimulationProps {
                simulation_id: self.simulation_id.into(),
                attempt_id: self.attempt_id.into(),
                total_task_count: self.total_task_count,
                user_id: self.user_id.map(AttrValue::from),
                api_base: self.api_base.into(),
                auth_token: self.auth_token.map(AttrValue::from),
            },
            task_titles: self.task_titles.into_iter().map(AttrValue::from).collect(),
            on_all_completed: Callback::noop(),
        }
    }
}

const OFFLINE_NOTICE: &str = "Saved on this device. It will sync when the connection returns.";

#[function_component(SimulationView)]
pub fn simulation_view(props: &Props) -> Html {
    let progress = use_simulation_progress(&props.simulation);
    let pending = use_state(|| None::<u32>);
    let notice = use_state(|| None::<AttrValue>);

    let on_complete = {
        let progress = progress.clone();
        let pending = pending.clone();
        let notice = notice.clone();
        Callback::from(move |index: u32| {
            if pending.is_some() {
                return;
            }
            pending.set(Some(index));
            let pending = pending.clone();
            let notice = notice.clone();
            progress.complete(
                index,
                Callback::from(move |result: Result<CompletionReport, ProgressError>| {
                    pending.set(None);
                    match result {
                        Ok(report) if report.remote_failed() => {
                            notice.set(Some(AttrValue::from(OFFLINE_NOTICE)));
                        }
                        Ok(_) => notice.set(None),
                        Err(err) => {
                            dom::console_error(&err.to_string());
                            notice.set(Some(AttrValue::from(err.to_string())));
                        }
                    }
                }),
            );
        })
    };

    let all_done = progress.all_completed();
    {
        let on_all_completed = props.on_all_completed.clone();
        use_effect_with(all_done, move |done| {
            if *done {
                on_all_completed.emit(());
            }
            || {}
        });
    }

    let percent = progress.percent();
    html! {
        <section class="simulation-progress" data-phase={progress.phase().label()}>
            <header class="simulation-progress__header">
                <progress class="progress progress-primary" value={percent.to_string()} max="100"></progress>
                <span class="simulation-progress__pct">{ format!("{percent}% complete") }</span>
            </header>
            <TaskStepper
                statuses={progress.statuses()}
                titles={props.task_titles.clone()}
                pending={*pending}
                {on_complete}
            />
            if let Some(message) = (*notice).clone() {
                <p class="alert alert-warning" role="status">{ message }</p>
            }
            if all_done {
                <p class="alert alert-success" role="status">{ "All tasks completed" }</p>
            }
        </section>
    }
}
