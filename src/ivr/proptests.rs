//! Property-based tests for the dialog engine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::menu::{NodeId, Transition};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_node() -> impl Strategy<Value = NodeId> {
    prop_oneof![
        Just(NodeId::LanguageSelect),
        Just(NodeId::MainMenu),
        Just(NodeId::AppointmentDoctor),
        Just(NodeId::Pathology),
    ]
}

fn arb_locale() -> impl Strategy<Value = String> {
    prop_oneof![Just("en".to_string()), Just("hi".to_string())]
}

fn arb_selection() -> impl Strategy<Value = Selection> {
    (arb_node(), "[a-z]{1,10}", "\\PC{0,20}").prop_map(|(node, category, label)| Selection {
        node,
        category,
        label,
    })
}

fn arb_state() -> impl Strategy<Value = DialState> {
    (
        arb_node(),
        arb_locale(),
        proptest::collection::vec(arb_selection(), 0..3),
        0u8..3,
    )
        .prop_map(|(node, locale, selections, retries)| DialState {
            node,
            locale,
            selections,
            retries,
        })
}

fn arb_digits() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9*#]",
        "[0-9]{2,4}",
        "\\PC{0,8}",
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: evaluation is total and deterministic, and every response
    // either ends the call or continues it
    #[test]
    fn prop_evaluate_total_and_deterministic(state in arb_state(), digits in arb_digits()) {
        let engine = clinic_engine();
        let first = engine.evaluate(&state, &digits);
        let second = engine.evaluate(&state, &digits);
        prop_assert_eq!(&first, &second);

        let last = first.instructions.last();
        prop_assert!(
            matches!(
                last,
                Some(Instruction::GatherDigits { .. } | Instruction::Redirect(_) | Instruction::Hangup | Instruction::Dial { .. })
            ),
            "Response must end by continuing or closing the call, got {:?}",
            first.instructions
        );
    }

    // Invariant 2: a mapped digit leads to the same place regardless of how
    // the caller got to the node
    #[test]
    fn prop_mapped_digit_independent_of_history(
        node in arb_node(),
        locale in arb_locale(),
        history in proptest::collection::vec(arb_selection(), 0..3),
        other_history in proptest::collection::vec(arb_selection(), 0..3),
        retries in 0u8..3,
        other_retries in 0u8..3,
    ) {
        let engine = clinic_engine();
        let state = DialState { node, locale: locale.clone(), selections: history, retries };
        let other = DialState { node, locale, selections: other_history, retries: other_retries };
        let menu = engine.script().node(node).unwrap();

        for (digit, option) in &menu.options {
            let result = engine.evaluate(&state, &digit.to_string());
            let other_result = engine.evaluate(&other, &digit.to_string());

            let kinds: Vec<_> = result.instructions.iter().map(Instruction::kind).collect();
            let other_kinds: Vec<_> = other_result.instructions.iter().map(Instruction::kind).collect();
            prop_assert_eq!(kinds, other_kinds);
            prop_assert_eq!(result.next_state.node, other_result.next_state.node);
            prop_assert_eq!(&result.next_state.locale, &other_result.next_state.locale);
            if option.selection.is_some() {
                prop_assert_eq!(result.next_state.selections.last(), other_result.next_state.selections.last());
            }
            prop_assert_eq!(result.next_state.retries, 0);

            if let Transition::Goto(target) = option.target {
                prop_assert_eq!(result.next_state.node, target);
            }
        }
    }

    // Invariant 3: every state the engine hands out survives the codec
    #[test]
    fn prop_reachable_states_round_trip(state in arb_state(), digits in arb_digits()) {
        let engine = clinic_engine();
        let codec = engine.codec();
        prop_assert_eq!(codec.decode(Some(&codec.encode(&state))), state.clone());

        for instruction in engine.evaluate(&state, &digits).instructions {
            let carried = match instruction {
                Instruction::GatherDigits { next_state, .. } => next_state,
                Instruction::Record { result_state, .. } => result_state,
                Instruction::Redirect(next) => next,
                _ => continue,
            };
            prop_assert_eq!(codec.decode(Some(&codec.encode(&carried))), carried);
        }
    }

    // Invariant 4: undecodable suffixes restart the call
    #[test]
    fn prop_garbage_decodes_to_initial(garbage in "[!@$%^&()~ .]{1,40}") {
        let codec = clinic_engine().codec();
        prop_assert_eq!(codec.decode(Some(&garbage)), codec.initial());
    }

    // Invariant 5: well-formed base64 that is not a state also restarts
    #[test]
    fn prop_non_json_payload_decodes_to_initial(
        bytes in proptest::collection::vec(any::<u8>(), 1..64)
            .prop_filter("not a JSON object", |b| b[0] != b'{')
    ) {
        let codec = clinic_engine().codec();
        let suffix = URL_SAFE_NO_PAD.encode(bytes);
        prop_assert_eq!(codec.decode(Some(&suffix)), codec.initial());
    }

    // Invariant 6: the repeat digit replays the node without a notice
    #[test]
    fn prop_repeat_replays_prompt(state in arb_state()) {
        let engine = clinic_engine();
        let result = engine.evaluate(&state, "9");
        prop_assert_eq!(result, engine.present(&state.with_retries(0)));
    }

    // Invariant 7: below the top node, a wrong digit never ends the call
    #[test]
    fn prop_invalid_digit_never_hangs_up_in_menus(
        node in prop_oneof![Just(NodeId::MainMenu), Just(NodeId::AppointmentDoctor), Just(NodeId::Pathology)],
        locale in arb_locale(),
        retries in 0u8..3,
        digit in "[0-8*#]",
    ) {
        let engine = clinic_engine();
        let state = DialState { node, locale, selections: vec![], retries };
        let menu = engine.script().node(node).unwrap();
        prop_assume!(!menu.options.contains_key(&digit.chars().next().unwrap()));

        let result = engine.evaluate(&state, &digit);
        prop_assert!(!result.instructions.contains(&Instruction::Hangup));
        prop_assert_eq!(result.next_state.node, node);
    }

    // Invariant 8: prompts are spoken in the caller's locale
    #[test]
    fn prop_prompt_in_caller_locale(state in arb_state()) {
        let engine = clinic_engine();
        let menu = engine.script().node(state.node).unwrap();
        let expected = engine.locales().resolve(&state.locale, &menu.prompt_key, &[]);
        let result = engine.present(&state);
        prop_assert_eq!(&result.instructions[0], &Instruction::Speak(expected));
    }
}
