mod concurrency;
mod faults;
mod filter;
mod invariants;
mod propagation;
mod reconcile;
