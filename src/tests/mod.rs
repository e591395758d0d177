mod generator_scenarios;
mod scenarios;
