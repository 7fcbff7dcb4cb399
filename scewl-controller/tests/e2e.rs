//! End-to-end tests: a controller on socket pairs, a CPU driven through
//! `BusClient`, and scripted radio/FAA peers.

use scewl_client::{BusClient, ClientError};
use scewl_controller::{Config, Controller, HostLink};
use scewl_core::{BootOutcome, Links};
use scewl_protocol::{
    decode, encode, send_frame, DeviceId, Frame, ReadMode, RegistrationCode, RegistrationMessage,
    StreamLink, MAX_DATA_SIZE,
};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};

const ME: DeviceId = DeviceId::new(10);
const PEER: DeviceId = DeviceId::new(11);

fn config() -> Config {
    let mut config = Config::default();
    config.device.id = ME;
    config.gateway.idle_sleep_us = 50;
    config
}

struct Harness {
    cpu: UnixStream,
    radio: UnixStream,
    faa: UnixStream,
    controller: Controller,
}

fn harness(config: Config) -> Harness {
    let (cpu, cpu_peer) = UnixStream::pair().unwrap();
    let (radio, radio_peer) = UnixStream::pair().unwrap();
    let (faa, faa_peer) = UnixStream::pair().unwrap();
    let radio = StreamLink::new(radio)
        .with_read_timeout(config.links.radio.read_timeout())
        .unwrap();
    let links = Links::new(cpu.into(), HostLink::Unix(radio), faa.into());
    Harness {
        cpu: cpu_peer,
        radio: radio_peer,
        faa: faa_peer,
        controller: Controller::with_links(config, links),
    }
}

fn sss_reply(code: RegistrationCode) -> Vec<u8> {
    let msg = RegistrationMessage::new(ME, code).encode();
    encode(DeviceId::SSS, ME, &msg).unwrap().to_vec()
}

fn spawn(mut controller: Controller) -> JoinHandle<Controller> {
    thread::spawn(move || {
        controller.run();
        controller
    })
}

/// Reads one frame from a raw peer socket.
fn read_frame(stream: &UnixStream) -> Frame {
    let mut link = StreamLink::new(stream.try_clone().unwrap());
    decode(&mut link, MAX_DATA_SIZE, ReadMode::Blocking).unwrap()
}

/// Answers every registration request on the radio, echoing its code.
fn fake_sss(radio: UnixStream) -> JoinHandle<Vec<RegistrationCode>> {
    thread::spawn(move || {
        let mut link = StreamLink::new(radio);
        let mut seen = Vec::new();
        while let Some(frame) = decode(&mut link, MAX_DATA_SIZE, ReadMode::Blocking) {
            if frame.target != DeviceId::SSS {
                continue;
            }
            let request = RegistrationMessage::decode(&frame.payload).unwrap();
            seen.push(request.code);
            let reply = RegistrationMessage::new(request.device_id, request.code);
            send_frame(
                &mut link,
                &Frame::new(DeviceId::SSS, request.device_id, reply.encode()),
            )
            .unwrap();
        }
        seen
    })
}

#[test]
fn test_boot_send_and_receive() {
    let mut h = harness(config());
    h.radio
        .write_all(&sss_reply(RegistrationCode::Register))
        .unwrap();
    assert_eq!(h.controller.boot(), Some(BootOutcome::Registered));

    let registration = read_frame(&h.radio);
    assert_eq!(registration.target, DeviceId::SSS);

    let controller = spawn(h.controller);
    let mut cpu = BusClient::new(StreamLink::new(h.cpu), ME);

    cpu.send(PEER, b"HELLO").unwrap();
    let mut wire = [0u8; 13];
    h.radio.read_exact(&mut wire).unwrap();
    assert_eq!(
        wire,
        [0x53, 0x43, 0x0B, 0x00, 0x0A, 0x00, 0x05, 0x00, 0x48, 0x45, 0x4C, 0x4C, 0x4F]
    );

    h.radio
        .write_all(&encode(PEER, ME, b"hi back").unwrap())
        .unwrap();
    let frame = cpu.recv(ReadMode::Blocking).unwrap();
    assert_eq!((frame.source, frame.target), (PEER, ME));
    assert_eq!(frame.payload.as_ref(), b"hi back");

    h.radio
        .write_all(&encode(PEER, DeviceId::BROADCAST, b"to all").unwrap())
        .unwrap();
    let frame = cpu.recv(ReadMode::Blocking).unwrap();
    assert_eq!(frame.target, DeviceId::BROADCAST);

    drop(cpu);
    let controller = controller.join().unwrap();
    assert_eq!(controller.stats().to_cpu, 2);
    assert_eq!(controller.stats().to_radio, 1);
}

#[test]
fn test_denied_device_keeps_faa() {
    // the radio peer never answers, so every handshake times out
    let mut cfg = config();
    cfg.links.radio.read_timeout_ms = Some(20);
    let mut h = harness(cfg);

    assert_eq!(h.controller.boot(), Some(BootOutcome::Denied));
    assert!(h.controller.router().registration().is_denied());

    let controller = spawn(h.controller);
    let mut cpu = BusClient::new(StreamLink::new(h.cpu), ME);

    // bus traffic is refused without reaching the radio
    cpu.send(PEER, b"blocked").unwrap();
    assert!(matches!(
        cpu.register(),
        Err(ClientError::Rejected(RegistrationCode::Register))
    ));

    // FAA works in both directions
    cpu.send(DeviceId::FAA, b"mayday").unwrap();
    let frame = read_frame(&h.faa);
    assert_eq!((frame.source, frame.target), (ME, DeviceId::FAA));
    assert_eq!(frame.payload.as_ref(), b"mayday");

    h.faa
        .write_all(&encode(DeviceId::FAA, ME, b"land now").unwrap())
        .unwrap();
    let frame = cpu.recv(ReadMode::Blocking).unwrap();
    assert_eq!(frame.source, DeviceId::FAA);
    assert_eq!(frame.payload.as_ref(), b"land now");

    drop(cpu);
    let controller = controller.join().unwrap();
    assert_eq!(controller.stats().to_radio, 0);
    assert!(controller.stats().refused >= 2);
}

#[test]
fn test_cpu_registration_through_loop() {
    let mut cfg = config();
    cfg.gateway.boot_register = false;
    let mut h = harness(cfg);
    assert_eq!(h.controller.boot(), None);

    let sss = fake_sss(h.radio.try_clone().unwrap());
    let controller = spawn(h.controller);
    let mut cpu = BusClient::new(StreamLink::new(h.cpu), ME);

    cpu.register().unwrap();
    cpu.send(PEER, b"now registered").unwrap();
    cpu.deregister().unwrap();

    drop(cpu);
    let controller = controller.join().unwrap();
    assert!(!controller.router().registration().is_registered());
    assert_eq!(controller.stats().registrations, 2);

    // closing the controller's radio end stops the fake SSS
    drop(controller);
    drop(h.radio);
    assert_eq!(
        sss.join().unwrap(),
        vec![RegistrationCode::Register, RegistrationCode::Deregister]
    );
}
