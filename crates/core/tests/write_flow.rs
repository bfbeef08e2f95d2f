//! End-to-end write attempts against the scripted fake reader and the
//! simulated Type 2 tag.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tagwrite::{
	Error, ErrorKind, InvalidationReason, MULTIPLE_TAGS_MESSAGE, MemoryReader, MemoryTagConfig, NdefStatus, Payload,
	SUCCESS_MESSAGE, SessionConfig, TagStatus, TypeNameFormat, WriteCoordinator, WriteState,
};
use tagwrite_runtime::{FakeReaderBuilder, ReaderCall};
use tokio::sync::mpsc;
use tokio::time::timeout;

type Updates = Arc<Mutex<Vec<(WriteState, String)>>>;

fn config() -> SessionConfig {
	SessionConfig::default().with_discovery_timeout(Duration::from_secs(5))
}

fn recording(coordinator: WriteCoordinator) -> (WriteCoordinator, Updates) {
	let updates: Updates = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&updates);
	let coordinator = coordinator.with_status_sink(move |state: &WriteState, message: &str| {
		sink.lock().push((*state, message.to_string()));
	});
	(coordinator, updates)
}

/// Completion that forwards every call, so a second invocation would be observable.
fn completion_channel() -> (impl FnOnce(tagwrite::Result<()>) + Send + 'static, mpsc::UnboundedReceiver<tagwrite::Result<()>>) {
	let (tx, rx) = mpsc::unbounded_channel();
	(move |result| {
		let _ = tx.send(result);
	}, rx)
}

async fn single_outcome(rx: &mut mpsc::UnboundedReceiver<tagwrite::Result<()>>) -> tagwrite::Result<()> {
	let result = timeout(Duration::from_secs(5), rx.recv())
		.await
		.expect("completion did not fire")
		.expect("completion dropped without firing");
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert!(rx.try_recv().is_err(), "completion fired more than once");
	result
}

#[tokio::test]
async fn writes_540_zero_bytes_as_single_opaque_record() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let (coordinator, updates) = recording(WriteCoordinator::new(reader).with_config(config()));

	let payload = vec![0u8; 540];
	let (done, mut rx) = completion_channel();
	coordinator.write(payload.clone(), done);
	assert_eq!(coordinator.state(), WriteState::Discovering);

	controller.present_tags(1);
	assert_eq!(single_outcome(&mut rx).await, Ok(()));

	let submitted = controller.submitted();
	assert_eq!(submitted.len(), 1);
	let records = &submitted[0].records;
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].tnf, TypeNameFormat::Unknown);
	assert!(records[0].record_type.is_empty());
	assert!(records[0].id.is_empty());
	assert_eq!(records[0].payload, payload);

	assert_eq!(coordinator.state(), WriteState::Succeeded);
	assert_eq!(coordinator.status(), SUCCESS_MESSAGE);
	assert_eq!(controller.alerts().last().map(String::as_str), Some(SUCCESS_MESSAGE));
	assert_eq!(controller.invalidations(), vec![None]);
	assert_eq!(
		controller.calls(),
		vec![ReaderCall::Connect, ReaderCall::QueryStatus, ReaderCall::WriteMessage]
	);

	let states: Vec<WriteState> = updates.lock().iter().map(|(state, _)| *state).collect();
	assert_eq!(
		states,
		vec![
			WriteState::Discovering,
			WriteState::Validating,
			WriteState::Connecting,
			WriteState::QueryingStatus,
			WriteState::Writing,
			WriteState::Succeeded,
		]
	);
}

#[tokio::test]
async fn collision_keeps_polling_until_timeout() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let (coordinator, updates) = recording(
		WriteCoordinator::new(reader).with_config(config().with_discovery_timeout(Duration::from_millis(100))),
	);

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![0xAA; 16], done);
	controller.present_tags(2);

	let result = single_outcome(&mut rx).await;
	let err = result.unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.kind(), ErrorKind::DiscoveryInvalidated);

	assert_eq!(controller.restart_count(), 1);
	assert!(controller.alerts().iter().any(|alert| alert == MULTIPLE_TAGS_MESSAGE));
	assert!(controller.calls().is_empty());
	assert!(controller.submitted().is_empty());

	let updates = updates.lock();
	assert!(updates.contains(&(WriteState::Discovering, MULTIPLE_TAGS_MESSAGE.to_string())));
	assert!(!updates.iter().any(|(state, _)| *state == WriteState::Validating));
	assert_eq!(
		updates.last().map(|(state, _)| *state),
		Some(WriteState::Failed(ErrorKind::DiscoveryInvalidated))
	);
}

#[tokio::test]
async fn collision_then_single_tag_succeeds() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![1, 2, 3], done);
	controller.present_tags(3);
	controller.present_tags(1);

	assert_eq!(single_outcome(&mut rx).await, Ok(()));
	assert_eq!(controller.restart_count(), 1);
	assert_eq!(controller.submitted().len(), 1);
}

#[tokio::test]
async fn read_only_tag_is_never_written() {
	let (reader, controller) = FakeReaderBuilder::new()
		.with_status(TagStatus::new(NdefStatus::ReadOnly, 492))
		.build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![0u8; 540], done);
	controller.present_tags(1);

	assert_eq!(single_outcome(&mut rx).await, Err(Error::NotWritable));
	assert_eq!(coordinator.state(), WriteState::Failed(ErrorKind::NotWritable));
	assert_eq!(coordinator.status(), "Tag is not writable");
	assert!(!controller.calls().contains(&ReaderCall::WriteMessage));
	assert_eq!(controller.invalidations(), vec![Some("Tag is not writable".to_string())]);
}

#[tokio::test]
async fn unformatted_tag_is_not_writable() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());
	controller.queue_query(Ok(TagStatus::new(NdefStatus::NotSupported, 0)));

	let (done, mut rx) = completion_channel();
	coordinator.write([9u8; 4], done);
	controller.present_tags(1);

	assert_eq!(single_outcome(&mut rx).await, Err(Error::NotWritable));
	assert!(controller.submitted().is_empty());
}

#[tokio::test]
async fn second_write_while_in_flight_is_busy() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());

	let (first, mut first_rx) = completion_channel();
	coordinator.write(vec![1u8; 8], first);

	let busy = Arc::new(Mutex::new(None));
	let seen = Arc::clone(&busy);
	coordinator.write(vec![2u8; 8], move |result| *seen.lock() = Some(result));

	assert_eq!(*busy.lock(), Some(Err(Error::Busy)));
	assert_eq!(coordinator.state(), WriteState::Discovering);
	assert_eq!(controller.begin_count(), 1);

	controller.present_tags(1);
	assert_eq!(single_outcome(&mut first_rx).await, Ok(()));
	assert_eq!(controller.submitted()[0].records[0].payload, vec![1u8; 8]);
}

#[tokio::test]
async fn unavailable_reader_fails_synchronously() {
	let (reader, controller) = FakeReaderBuilder::new().unavailable().build();
	let (coordinator, updates) = recording(WriteCoordinator::new(reader));

	let outcome = Arc::new(Mutex::new(None));
	let seen = Arc::clone(&outcome);
	coordinator.write(vec![1, 2, 3], move |result| *seen.lock() = Some(result));

	assert_eq!(*outcome.lock(), Some(Err(Error::Unavailable)));
	assert_eq!(coordinator.state(), WriteState::Failed(ErrorKind::Unavailable));
	assert_eq!(coordinator.status(), "NFC not available");
	assert_eq!(controller.begin_count(), 0);
	assert_eq!(
		*updates.lock(),
		vec![(WriteState::Failed(ErrorKind::Unavailable), "NFC not available".to_string())]
	);
}

#[tokio::test]
async fn connect_failure_is_reported() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());
	controller.queue_connect(Err(Error::ConnectionFailed("tag moved away".to_string())));

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![1], done);
	controller.present_tags(1);

	let err = single_outcome(&mut rx).await.unwrap_err();
	assert_eq!(err, Error::ConnectionFailed("tag moved away".to_string()));
	assert_eq!(err.reason(), "tag moved away");
	assert_eq!(
		controller.invalidations(),
		vec![Some("Connection failed: tag moved away".to_string())]
	);
	assert_eq!(controller.calls(), vec![ReaderCall::Connect]);
}

#[tokio::test]
async fn query_failure_maps_to_connection_failed() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());
	controller.queue_query(Err(Error::WriteFailed("no answer to READ".to_string())));

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![1], done);
	controller.present_tags(1);

	let err = single_outcome(&mut rx).await.unwrap_err();
	assert_eq!(err, Error::ConnectionFailed("no answer to READ".to_string()));
	assert_eq!(coordinator.state(), WriteState::Failed(ErrorKind::ConnectionFailed));
}

#[tokio::test]
async fn write_failure_is_reported() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let (coordinator, updates) = recording(WriteCoordinator::new(reader).with_config(config()));
	controller.queue_write(Err(Error::WriteFailed("tag removed".to_string())));

	let result = {
		let write = coordinator.write_async(vec![5u8; 32]);
		controller.present_tags(1);
		write.await
	};

	assert_eq!(result, Err(Error::WriteFailed("tag removed".to_string())));
	assert_eq!(controller.submitted().len(), 1);
	assert_eq!(controller.invalidations(), vec![Some("Write failed: tag removed".to_string())]);
	assert_eq!(
		updates.lock().last().cloned(),
		Some((WriteState::Failed(ErrorKind::WriteFailed), "Write failed: tag removed".to_string()))
	);
}

#[tokio::test]
async fn invalidation_during_write_fails_attempt() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());
	controller.hold_writes();

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![3u8; 64], done);
	controller.present_tags(1);

	while controller.submitted().is_empty() {
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	assert_eq!(coordinator.state(), WriteState::Writing);
	controller.invalidate(InvalidationReason::ReaderError("RF field lost".to_string()));

	let err = single_outcome(&mut rx).await.unwrap_err();
	assert_eq!(
		err,
		Error::DiscoveryInvalidated(InvalidationReason::ReaderError("RF field lost".to_string()))
	);
	assert_eq!(coordinator.state(), WriteState::Failed(ErrorKind::DiscoveryInvalidated));
}

#[tokio::test]
async fn user_cancel_during_discovery() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());

	let (done, mut rx) = completion_channel();
	coordinator.write(vec![1], done);
	controller.invalidate(InvalidationReason::UserCanceled);

	let err = single_outcome(&mut rx).await.unwrap_err();
	assert_eq!(err, Error::DiscoveryInvalidated(InvalidationReason::UserCanceled));
	assert_eq!(coordinator.status(), "Session invalidated: session canceled by user");
	assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn new_attempt_after_terminal_state() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let coordinator = WriteCoordinator::new(reader).with_config(config());

	controller.queue_connect(Err(Error::ConnectionFailed("first try".to_string())));
	let first = coordinator.write_async(vec![1]);
	controller.present_tags(1);
	assert!(first.await.is_err());

	let second = coordinator.write_async(vec![2]);
	controller.present_tags(1);
	assert_eq!(second.await, Ok(()));

	assert_eq!(controller.begin_count(), 2);
	assert_eq!(coordinator.state(), WriteState::Succeeded);
}

#[tokio::test]
async fn status_reaches_sink_before_completion() {
	let (reader, controller) = FakeReaderBuilder::new().build();
	let (coordinator, updates) = recording(WriteCoordinator::new(reader).with_config(config()));

	let observed = Arc::new(Mutex::new(None));
	let seen = Arc::clone(&observed);
	let sink_view = Arc::clone(&updates);
	let (tx, rx) = tokio::sync::oneshot::channel();
	coordinator.write(Payload::from(vec![4u8; 4]), move |result| {
		*seen.lock() = sink_view.lock().last().cloned();
		let _ = tx.send(result);
	});
	controller.present_tags(1);

	assert_eq!(rx.await.unwrap(), Ok(()));
	assert_eq!(*observed.lock(), Some((WriteState::Succeeded, SUCCESS_MESSAGE.to_string())));
}

#[tokio::test]
async fn memory_tag_round_trip() {
	let reader = Arc::new(MemoryReader::new(MemoryTagConfig::ntag216()));
	let coordinator = WriteCoordinator::new(reader.clone()).with_config(config());

	let payload: Vec<u8> = (0..540u32).map(|i| (i % 251) as u8).collect();
	assert_eq!(coordinator.write_async(payload.clone()).await, Ok(()));

	let stored = reader.stored_message().unwrap();
	assert_eq!(stored.records.len(), 1);
	assert_eq!(stored.records[0].tnf, TypeNameFormat::Unknown);
	assert_eq!(stored.records[0].payload, payload);
}

#[tokio::test]
async fn memory_tag_too_small_fails_write() {
	let reader = Arc::new(MemoryReader::new(MemoryTagConfig::ntag213()));
	let coordinator = WriteCoordinator::new(reader.clone()).with_config(config());

	let err = coordinator.write_async(vec![0u8; 540]).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::WriteFailed);
	assert!(err.reason().contains("exceeds tag capacity"));
	let blank = MemoryReader::new(MemoryTagConfig::ntag213());
	assert_eq!(reader.memory_image(), blank.memory_image());
}

#[tokio::test]
async fn memory_tag_read_only_and_collisions() {
	let reader = Arc::new(MemoryReader::new(
		MemoryTagConfig::ntag216().read_only(true).with_collisions(2),
	));
	let (coordinator, updates) = recording(WriteCoordinator::new(reader).with_config(config()));

	assert_eq!(coordinator.write_async(vec![1, 2, 3]).await, Err(Error::NotWritable));
	let collisions = updates
		.lock()
		.iter()
		.filter(|(_, message)| message == MULTIPLE_TAGS_MESSAGE)
		.count();
	assert_eq!(collisions, 2);
}
