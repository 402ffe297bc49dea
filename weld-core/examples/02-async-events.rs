use futures::executor::block_on;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use weld_core::event::ObserverMethod;
use weld_core::manager::BeanManagerBuilder;
use weld_core::registry::BeanRegistryBuilder;
use weld_core::types::{Class, Type};

struct Download {
    url: &'static str,
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();

    // asynchronous observers only receive events fired with fire_async()
    let registry = BeanRegistryBuilder::new()
        .with_observer(
            ObserverMethod::builder(
                "downloader",
                Type::class(&Class::new("Download")),
                move |context, _| {
                    if let Some(download) = context.event_typed::<Download>() {
                        println!("Downloading {}", download.url);
                        counter.fetch_add(1, Ordering::SeqCst);
                    }

                    Ok(())
                },
            )
            .asynchronous()
            .build(),
        )
        .expect("error registering observer")
        .build()
        .expect("error building bean registry");
    let manager = BeanManagerBuilder::new(registry).build();

    let downloads = manager.event(Type::class(&Class::new("Download")));

    // synchronous firing skips asynchronous observers
    downloads
        .fire_typed(Download {
            url: "https://example.com/skipped",
        })
        .expect("error firing event");

    // the returned future is independent of the manager and can be moved to any executor
    let future = downloads
        .fire_async(Arc::new(Download {
            url: "https://example.com/archive.tar.gz",
        }));
    let event = block_on(future).expect("observer failed");

    println!(
        "Notified {} time(s) about {}",
        notified.load(Ordering::SeqCst),
        event
            .downcast_ref::<Download>()
            .map(|download| download.url)
            .unwrap_or_default()
    );
}
