use careersim_progress::TaskStatus;
use yew::prelude::*;

#[derive(Properties, PartialEq, Clone)]
pub struct Props {
    pub statuses: Vec<TaskStatus>,
    /// Display titles by task index; missing entries fall back to "Task N".
    #[prop_or_default]
    pub titles: Vec<AttrValue>,
    /// Task whose completion is in flight.
    #[prop_or_default]
    pub pending: Option<u32>,
    pub on_complete: Callback<u32>,
}

fn task_title(titles: &[AttrValue], idx: usize) -> AttrValue {
    titles
        .get(idx)
        .cloned()
        .unwrap_or_else(|| AttrValue::from(format!("Task {}", idx + 1)))
}

#[function_component(TaskStepper)]
pub fn task_stepper(props: &Props) -> Html {
    html! {
        <ol class="task-stepper" aria-label="Simulation tasks">
            { for props.statuses.iter().enumerate().map(|(idx, status)| {
                let Ok(index) = u32::try_from(idx) else {
                    return Html::default();
                };
                let label = status.label();
                let class = classes!("task", format!("task--{label}"));
                let body = match status {
                    TaskStatus::Completed => html! {
                        <span class="badge badge-success">{ "Completed" }</span>
                    },
                    TaskStatus::Available => {
                        let busy = props.pending == Some(index);
                        let on_complete = props.on_complete.clone();
                        let onclick = Callback::from(move |_: MouseEvent| on_complete.emit(index));
                        html! {
                            <button
                                class="btn btn-primary task__complete"
                                data-index={index.to_string()}
                                disabled={busy}
                                aria-busy={busy.to_string()}
                                {onclick}
                            >
                                { if busy { "Saving…" } else { "Mark complete" } }
                            </button>
                        }
                    }
                    TaskStatus::Locked => html! {
                        <button
                            class="btn task__complete"
                            data-index={index.to_string()}
                            disabled={true}
                        >
                            { "Locked" }
                        </button>
                    },
                };
                html! {
                    <li class={class} data-status={label}>
                        <span class="task__title">{ task_title(&props.titles, idx) }</span>
                        { body }
                    </li>
                }
            })}
        </ol>
    }
}
