mod dispatcher_tests;
mod orchestrator_tests;
mod pipeline_tests;
