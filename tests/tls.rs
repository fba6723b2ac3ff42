mod tls {
    use crossbeam_utils::thread;
    use tls_probe::tls_cell::{Error, EXTERNAL, LOCAL};

    #[test]
    fn access_while_exiting() {
        struct Foo;

        impl Drop for Foo {
            fn drop(&mut self) {
                // thread local destruction order is unspecified, so the record may or may not
                // still be around
                match LOCAL.accumulate(1) {
                    Ok(()) => assert_eq!(LOCAL.read(), Ok(43)),
                    Err(e) => assert_eq!(e, Error::Destroyed { owner: "LOCAL" }),
                }
            }
        }

        thread_local! {
            static FOO: Foo = Foo;
        }

        thread::scope(|scope| {
            scope.spawn(|_| {
                FOO.with(|_| ());
                LOCAL.initialize();
                LOCAL.accumulate(42).unwrap();
            });
        })
        .unwrap();
    }

    #[test]
    fn initialize_while_exiting() {
        struct Foo;

        impl Drop for Foo {
            fn drop(&mut self) {
                EXTERNAL.initialize();
                match EXTERNAL.read() {
                    Ok(value) => assert_eq!(value, 0),
                    Err(e) => assert_eq!(e, Error::Destroyed { owner: "EXTERNAL" }),
                }
            }
        }

        thread_local! {
            static FOO: Foo = Foo;
        }

        thread::scope(|scope| {
            scope.spawn(|_| {
                EXTERNAL.initialize();
                FOO.with(|_| ());
            });
        })
        .unwrap();
    }

    #[test]
    fn fresh_thread_is_uninitialized() {
        LOCAL.initialize();
        LOCAL.accumulate(9).unwrap();

        thread::scope(|scope| {
            scope.spawn(|_| {
                assert!(!LOCAL.is_initialized());
                assert_eq!(LOCAL.read(), Err(Error::Uninitialized { owner: "LOCAL" }));
            });
        })
        .unwrap();

        assert_eq!(LOCAL.read(), Ok(9));
    }

    #[test]
    fn many_threads() {
        const ITER_COUNT: i64 = 10_000;
        const THREAD_COUNT: i64 = 16;
        thread::scope(|s| {
            for t in 0..THREAD_COUNT {
                s.builder()
                    .name(format!("scoped_thread#{}", t))
                    .spawn(move |_| {
                        LOCAL.initialize();
                        for _ in 0..ITER_COUNT {
                            LOCAL.accumulate(t).unwrap();
                        }
                        assert_eq!(LOCAL.read(), Ok(t * ITER_COUNT));
                    })
                    .unwrap();
            }
        })
        .unwrap();
    }
}
