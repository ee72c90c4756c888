use avr_adc::{
    regs::{adcsra, admux, Prescaler, Reference, Register},
    sim::{SimDelay, SimRegisters},
    Adc, AdcChannel, Ain3, BoundedRetries, Config, Deadline, WaitError,
};

mod tests {
    use super::*;
    use embedded_hal::adc::OneShot;
    use fugit::ExtU32;

    fn init(sim: &mut SimRegisters) -> Adc<&mut SimRegisters, SimDelay> {
        let mut adc = Adc::new(sim, SimDelay::new());
        adc.init(true);
        adc
    }

    fn reference(sim: &SimRegisters) -> Option<Reference> {
        Reference::from_bits(admux::REFS.get(sim.peek(Register::Admux)))
    }

    #[test]
    fn init_configures_before_enabling() {
        let mut sim = SimRegisters::new();
        init(&mut sim);

        let control = sim.peek(Register::Adcsra);
        assert!(adcsra::ADEN.test(control));
        assert_eq!(adcsra::ADPS.get(control), Prescaler::Div128.bits());
        assert!(!adcsra::ADIF.test(control));
        assert_eq!(reference(&sim), Some(Reference::Avcc));
        assert!(!admux::ADLAR.test(sim.peek(Register::Admux)));
    }

    #[test]
    fn init_clears_left_adjust() {
        let mut sim = SimRegisters::new();
        sim.poke(Register::Admux, admux::ADLAR.mask());
        init(&mut sim);
        assert!(!admux::ADLAR.test(sim.peek(Register::Admux)));
    }

    #[test]
    fn teardown_after_init() {
        let mut sim = SimRegisters::new();
        let mut adc = init(&mut sim);
        assert!(adc.is_enabled());
        adc.init(false);
        assert!(!adc.is_enabled());
        drop(adc);

        let control = sim.peek(Register::Adcsra);
        assert!(!adcsra::ADEN.test(control));
        assert_eq!(adcsra::ADPS.get(control), 0);
        assert_eq!(admux::REFS.get(sim.peek(Register::Admux)), 0);
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut sim = SimRegisters::new();
        let mut adc = init(&mut sim);
        adc.disable();
        adc.disable();
        drop(adc);
        assert_eq!(sim.peek(Register::Adcsra), 0);
        assert_eq!(admux::REFS.get(sim.peek(Register::Admux)), 0);
    }

    #[test]
    fn every_channel_selects_its_mux_code() {
        for channel in AdcChannel::ALL {
            let mut sim = SimRegisters::new();
            let mut adc = init(&mut sim);
            assert!(adc.read_channel(channel).is_ok());
            drop(adc);

            let mux = sim.peek(Register::Admux);
            assert_eq!(admux::MUX.get(mux), channel.index());
            assert_eq!(reference(&sim), Some(Reference::Avcc));
            assert!(!admux::ADLAR.test(mux));
            assert_eq!(sim.stats().last_started_admux, Some(mux));
        }
    }

    #[test]
    fn channel_read_returns_the_sample() {
        let mut sim = SimRegisters::new();
        sim.set_sample(0, 0);
        sim.set_sample(2, 767);
        sim.set_sample(7, 1023);
        let mut adc = init(&mut sim);

        assert_eq!(adc.read_channel(AdcChannel::Adc2), Ok(767));
        assert_eq!(adc.read_channel(AdcChannel::Adc7), Ok(1023));
        assert_eq!(adc.read_channel(AdcChannel::Adc0), Ok(0));
    }

    #[test]
    fn combines_low_and_high_bytes() {
        let mut sim = SimRegisters::new();
        sim.force_result(0x02, 0xFF);
        let mut adc = init(&mut sim);
        assert_eq!(adc.read_channel(AdcChannel::Adc1), Ok(767));

        adc.registers_mut().force_result(0xFE, 0x01);
        assert_eq!(adc.read_channel(AdcChannel::Adc1), Ok(0x201));
        drop(adc);
        assert_eq!(sim.stats().order_violations, 0);
    }

    #[test]
    fn previous_channel_does_not_leak() {
        let mut sim = SimRegisters::new();
        let mut adc = init(&mut sim);
        assert!(adc.read_channel(AdcChannel::Adc7).is_ok());
        assert!(adc.read_channel(AdcChannel::Adc0).is_ok());
        assert_eq!(admux::MUX.get(adc.registers().peek(Register::Admux)), 0);

        assert!(adc.read_channel(AdcChannel::Adc5).is_ok());
        assert!(adc.read_channel(AdcChannel::Adc2).is_ok());
        assert_eq!(admux::MUX.get(adc.registers().peek(Register::Admux)), 2);
    }

    #[test]
    fn channel_read_after_temperature_restores_avcc() {
        let mut sim = SimRegisters::new();
        let mut adc = init(&mut sim);
        assert!(adc.read_internal_temperature().is_ok());
        assert!(adc.read_channel(AdcChannel::Adc4).is_ok());
        drop(adc);

        assert_eq!(reference(&sim), Some(Reference::Avcc));
        assert_eq!(admux::MUX.get(sim.peek(Register::Admux)), 4);
    }

    #[test]
    fn start_bit_seen_and_flag_cleared() {
        let mut sim = SimRegisters::new().with_polls_per_conversion(3);
        let mut adc = init(&mut sim);
        assert!(adc.read_channel(AdcChannel::Adc1).is_ok());
        assert!(adc.read_channel(AdcChannel::Adc6).is_ok());
        drop(adc);

        let stats = sim.stats();
        assert_eq!(stats.conversions_started, 2);
        assert_eq!(stats.conversions_completed, 2);
        assert_eq!(stats.busy_polls, 6);
        assert_eq!(stats.flag_clears, 2);
        let control = sim.peek(Register::Adcsra);
        assert!(!adcsra::ADIF.test(control));
        assert!(!adcsra::ADSC.test(control));
        assert!(adcsra::ADEN.test(control));
    }

    #[test]
    fn settles_before_each_conversion() {
        let mut sim = SimRegisters::new();
        let mut adc = init(&mut sim);
        assert!(adc.read_channel(AdcChannel::Adc3).is_ok());
        let (_, delay, _) = adc.free();
        assert_eq!(delay.calls, 1);
        assert_eq!(delay.last_us, Some(10));
        assert_eq!(delay.last_ms, None);
    }

    #[test]
    fn custom_settle_time() {
        let mut sim = SimRegisters::new();
        let config = Config::default().with_channel_settle(40.micros());
        let mut adc = Adc::with_config(&mut sim, SimDelay::new(), avr_adc::Blocking, config);
        adc.enable();
        assert!(adc.read_channel(AdcChannel::Adc0).is_ok());
        let (_, delay, _) = adc.free();
        assert_eq!(delay.last_us, Some(40));
    }

    #[test]
    fn stuck_converter_times_out() {
        let mut sim = SimRegisters::new();
        sim.set_stuck(true);
        let mut adc = Adc::with_config(
            &mut sim,
            SimDelay::new(),
            BoundedRetries::new(50),
            Config::default(),
        );
        adc.enable();
        assert_eq!(
            adc.read_channel(AdcChannel::Adc0),
            Err(WaitError::RetriesExhausted { polls: 50 })
        );
        assert_eq!(
            adc.read_internal_temperature(),
            Err(WaitError::RetriesExhausted { polls: 50 })
        );
        drop(adc);
        // the temperature read waits on the stuck conversion and never starts
        assert_eq!(sim.stats().conversions_started, 1);
        assert!(sim.is_converting());
    }

    #[test]
    fn deadline_gives_up_on_stuck_converter() {
        let mut sim = SimRegisters::new();
        sim.set_stuck(true);
        let wait = Deadline::new(SimDelay::new(), 200.micros(), 50.micros());
        let mut adc = Adc::with_config(&mut sim, SimDelay::new(), wait, Config::default());
        adc.enable();
        assert_eq!(
            adc.read_channel(AdcChannel::Adc2),
            Err(WaitError::DeadlineElapsed { waited_us: 200 })
        );
        let (_, _, wait) = adc.free();
        assert_eq!(wait.free().calls, 4);
    }

    #[test]
    fn read_before_init_times_out() {
        let mut sim = SimRegisters::new();
        let mut adc = Adc::with_config(
            &mut sim,
            SimDelay::new(),
            BoundedRetries::new(10),
            Config::default(),
        );
        assert!(!adc.is_enabled());
        assert!(adc.read_channel(AdcChannel::Adc0).is_err());
        drop(adc);
        assert_eq!(sim.stats().conversions_started, 0);
    }

    #[test]
    fn timed_out_conversion_is_not_returned_later() {
        let mut sim = SimRegisters::new().with_polls_per_conversion(5);
        sim.set_sample(1, 100);
        sim.set_sample(2, 200);
        let mut adc = Adc::with_config(
            &mut sim,
            SimDelay::new(),
            BoundedRetries::new(2),
            Config::default(),
        );
        adc.enable();
        assert_eq!(
            adc.read_channel(AdcChannel::Adc1),
            Err(WaitError::RetriesExhausted { polls: 2 })
        );
        let (regs, delay, _) = adc.free();

        // the abandoned Adc1 conversion is still running
        let mut adc = Adc::with_config(regs, delay, BoundedRetries::new(10), Config::default());
        assert_eq!(adc.read_channel(AdcChannel::Adc2), Ok(200));
        assert_eq!(adc.read_channel(AdcChannel::Adc1), Ok(100));
        drop(adc);

        let stats = sim.stats();
        assert_eq!(stats.conversions_started, 3);
        assert_eq!(stats.conversions_completed, 3);
        assert_eq!(stats.last_started_admux.map(|m| admux::MUX.get(m)), Some(1));
    }

    #[test]
    fn busy_converter_is_not_restarted() {
        let mut sim = SimRegisters::new().with_polls_per_conversion(10);
        sim.set_sample(1, 100);
        sim.set_sample(2, 200);
        let mut adc = Adc::with_config(
            &mut sim,
            SimDelay::new(),
            BoundedRetries::new(2),
            Config::default(),
        );
        adc.enable();
        assert!(adc.read_channel(AdcChannel::Adc1).is_err());
        // still busy with Adc1, so Adc2 is never started
        assert_eq!(
            adc.read_channel(AdcChannel::Adc2),
            Err(WaitError::RetriesExhausted { polls: 2 })
        );
        assert_eq!(adc.registers().stats().conversions_started, 1);
        assert_eq!(admux::MUX.get(adc.registers().peek(Register::Admux)), 1);
    }

    #[test]
    fn leftover_flag_cleared_before_start() {
        let mut sim = SimRegisters::new().with_polls_per_conversion(3);
        sim.set_sample(4, 444);
        let mut adc = init(&mut sim);
        let control = adc.registers().peek(Register::Adcsra);
        adc.registers_mut().poke(Register::Adcsra, adcsra::ADIF.set(control));

        assert_eq!(adc.read_channel(AdcChannel::Adc4), Ok(444));
        drop(adc);

        let stats = sim.stats();
        assert_eq!(stats.conversions_completed, 1);
        assert_eq!(stats.busy_polls, 3);
        assert_eq!(stats.flag_clears, 2);
        assert!(!sim.is_converting());
        assert!(!adcsra::ADIF.test(sim.peek(Register::Adcsra)));
    }

    #[test]
    fn enabling_after_a_failed_read_recovers() {
        let mut sim = SimRegisters::new();
        sim.set_sample(6, 606);
        let mut adc = Adc::with_config(
            &mut sim,
            SimDelay::new(),
            BoundedRetries::new(10),
            Config::default(),
        );
        assert!(adc.read_channel(AdcChannel::Adc6).is_err());
        adc.init(true);
        assert_eq!(adc.read_channel(AdcChannel::Adc6), Ok(606));
    }

    #[test]
    fn one_shot_pins() {
        let mut sim = SimRegisters::new();
        sim.set_sample(3, 321);
        let mut adc = init(&mut sim);
        let mut pin = Ain3;
        let value: u16 = nb::block!(adc.read(&mut pin)).unwrap();
        assert_eq!(value, 321);
        assert_eq!(admux::MUX.get(adc.registers().peek(Register::Admux)), 3);
    }
}
