//! Enqueues calls to two hosts under a tight per-host cap and watches admission happen.
use reqcore::dispatcher::{Dispatcher, SimpleCall};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let dispatcher = Dispatcher::new();
    dispatcher.set_max_requests_per_host(2).unwrap();

    let completed = Arc::new(AtomicUsize::new(0));
    dispatcher.set_idle_callback(Some({
        let completed = Arc::clone(&completed);
        move || println!("dispatcher idle after {} calls", completed.load(Ordering::SeqCst))
    }));

    for i in 0..5 {
        let call = Arc::new(SimpleCall::new("api.example.com"));
        let completed = Arc::clone(&completed);
        dispatcher.enqueue(call, move || {
            std::thread::sleep(Duration::from_millis(20));
            println!("call {i} to api.example.com finished");
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    while completed.load(Ordering::SeqCst) < 5 {
        std::thread::sleep(Duration::from_millis(10));
    }
}
