mod scenario;

mod state_initial;
