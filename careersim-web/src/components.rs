pub mod simulation_view;
pub mod task_stepper;
